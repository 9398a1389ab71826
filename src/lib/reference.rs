//! Reference FASTA loaded into memory.
//!
//! The reference only supplies the `Reference` column of the count table, so every contig is
//! read once at startup and bases are looked up by 0-based position afterwards.

use ahash::AHashMap;
use anyhow::{Context, Result};
use log::debug;
use noodles::fasta;
use std::path::Path;
use std::sync::Arc;

use crate::errors::UmiecError;

/// In-memory reference sequences keyed by contig name. Cloning is cheap.
#[derive(Clone, Debug, Default)]
pub struct ReferenceGenome {
    sequences: Arc<AHashMap<String, Vec<u8>>>,
}

impl ReferenceGenome {
    /// Loads every sequence of a FASTA file, uppercased.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or cannot be parsed as FASTA.
    ///
    /// # Examples
    /// ```no_run
    /// use umiec_lib::reference::ReferenceGenome;
    ///
    /// let reference = ReferenceGenome::from_path("hg38.fa")?;
    /// let base = reference.base_at("chr1", 10_000);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(UmiecError::InvalidFileFormat {
                file_type: "Reference FASTA".to_string(),
                path: path.display().to_string(),
                reason: "File does not exist".to_string(),
            }
            .into());
        }

        let mut reader = fasta::io::reader::Builder
            .build_from_path(path)
            .with_context(|| format!("Failed to open reference: {}", path.display()))?;

        let mut sequences = AHashMap::new();
        for result in reader.records() {
            let record =
                result.with_context(|| format!("Failed to parse reference: {}", path.display()))?;
            let name = String::from_utf8_lossy(record.name()).into_owned();
            let bases: &[u8] = record.sequence().as_ref();
            sequences.insert(name, bases.to_ascii_uppercase());
        }

        debug!("Loaded {} reference contigs from {}", sequences.len(), path.display());
        Ok(Self { sequences: Arc::new(sequences) })
    }

    /// Builds a reference from in-memory sequences.
    #[must_use]
    pub fn from_sequences<I, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let sequences = sequences
            .into_iter()
            .map(|(name, bases)| (name.into(), bases.to_ascii_uppercase()))
            .collect();
        Self { sequences: Arc::new(sequences) }
    }

    /// The base at a 0-based position, or `None` past the end of the contig or for an
    /// unknown contig.
    #[must_use]
    pub fn base_at(&self, contig: &str, pos: usize) -> Option<u8> {
        self.sequences.get(contig).and_then(|seq| seq.get(pos)).copied()
    }

    /// Returns the sequence of a contig.
    ///
    /// # Errors
    /// Returns [`UmiecError::ReferenceNotFound`] if the contig is not in the reference.
    pub fn sequence(&self, contig: &str) -> crate::errors::Result<&[u8]> {
        self.sequences
            .get(contig)
            .map(Vec::as_slice)
            .ok_or_else(|| UmiecError::ReferenceNotFound { ref_name: contig.to_string() })
    }

    /// Checks that every named contig is present.
    ///
    /// # Errors
    /// Returns [`UmiecError::ReferenceNotFound`] for the first missing contig.
    pub fn require_contigs<'a>(
        &self,
        contigs: impl IntoIterator<Item = &'a str>,
    ) -> crate::errors::Result<()> {
        for contig in contigs {
            self.sequence(contig)?;
        }
        Ok(())
    }

    /// Number of contigs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns true if no contig is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
