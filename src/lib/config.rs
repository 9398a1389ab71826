//! The immutable configuration of one consensus run.

use std::time::Duration;

use umiec_consensus::{CountMode, ConsensusOptions, DEFAULT_FAMILY_SIZES};
use umiec_umi::ClusterOptions;

use crate::bam_io::UmiSource;
use crate::errors::{Result, UmiecError};
use crate::validation::{validate_fraction, validate_frequency, validate_positive};

/// Everything a region worker and the scheduler need to know, validated once up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Prefix of every output file
    pub sample_name: String,
    pub cluster: ClusterOptions,
    pub consensus: ConsensusOptions,
    pub count_mode: CountMode,
    /// Family-size thresholds of the count table and statistics
    pub family_sizes: Vec<usize>,
    /// Write single-read families to the consensus BAM
    pub include_singletons: bool,
    /// Maximum gap between reads of one auto-detected region
    pub merge_gap: usize,
    /// Worker threads
    pub threads: usize,
    /// Largest tolerated share of failed regions
    pub max_failed_fraction: f64,
    /// Per-region deadline
    pub region_timeout: Option<Duration>,
    pub umi_source: UmiSource,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_name: "sample".to_string(),
            cluster: ClusterOptions::default(),
            consensus: ConsensusOptions::default(),
            count_mode: CountMode::default(),
            family_sizes: DEFAULT_FAMILY_SIZES.to_vec(),
            include_singletons: false,
            merge_gap: 0,
            threads: 1,
            max_failed_fraction: 0.0,
            region_timeout: None,
            umi_source: UmiSource::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks every parameter.
    ///
    /// # Errors
    /// Returns [`UmiecError::InvalidFrequency`] for a consensus or indel frequency outside
    /// `(0, 1]`, and [`UmiecError::InvalidParameter`] for any other invalid value.
    pub fn validate(&self) -> Result<()> {
        validate_frequency(self.consensus.consensus_frequency)?;
        validate_frequency(self.consensus.indel_frequency)?;
        validate_fraction(self.max_failed_fraction, "max-failed-fraction")?;
        validate_positive(self.threads, "threads")?;

        if self.sample_name.is_empty() || self.sample_name.contains('/') {
            return Err(UmiecError::InvalidParameter {
                parameter: "sample-name".to_string(),
                reason: format!("must be a non-empty file name prefix, got '{}'", self.sample_name),
            });
        }
        if self.family_sizes.is_empty() {
            return Err(UmiecError::InvalidParameter {
                parameter: "family-sizes".to_string(),
                reason: "at least one family size is required".to_string(),
            });
        }
        if self.region_timeout.is_some_and(|t| t.is_zero()) {
            return Err(UmiecError::InvalidParameter {
                parameter: "region-timeout".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Family-size thresholds sorted, deduplicated, and starting at 0.
    #[must_use]
    pub fn thresholds(&self) -> Vec<usize> {
        let mut thresholds: Vec<usize> =
            std::iter::once(0).chain(self.family_sizes.iter().copied()).collect();
        thresholds.sort_unstable();
        thresholds.dedup();
        thresholds
    }
}
