//! BAM input and output.
//!
//! Input records are converted into [`AlignedRead`]s: unmapped, secondary and supplementary
//! records are skipped and counted, positions become 0-based, and the UMI is taken from a
//! SAM tag or from the end of the read name. Consensus reads are converted back into
//! [`RecordBuf`]s carrying the representative UMI and the family size as tags.

use anyhow::{Context, Result};
use bstr::BString;
use log::debug;
use noodles::bam;
use noodles::bgzf;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::MappingQuality;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::Program;
use noodles::sam::header::record::value::map::program::tag as pg_tag;
use std::fs::File;
use std::path::Path;

use umiec_consensus::{AlignedRead, ConsensusRecord, Strand};

use crate::progress::ProgressTracker;

/// Reader over a BGZF-compressed BAM file.
pub type BamReader = bam::io::Reader<bgzf::io::Reader<File>>;

/// Writer producing a BGZF-compressed BAM file.
pub type BamWriter = bam::io::Writer<bgzf::io::Writer<File>>;

/// Tag holding the raw UMI.
pub const UMI_TAG: Tag = Tag::new(b'R', b'X');

/// Tag holding the family size of a consensus read.
pub const FAMILY_SIZE_TAG: Tag = Tag::new(b'c', b'D');

/// Mapping quality given to consensus reads.
pub const CONSENSUS_MAPPING_QUALITY: u8 = 60;

/// Where the UMI of each read is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmiSource {
    /// A string-valued SAM tag
    Tag(Tag),
    /// The last field of the read name after the delimiter
    ReadName(char),
}

impl Default for UmiSource {
    fn default() -> Self {
        Self::Tag(UMI_TAG)
    }
}

impl UmiSource {
    /// Extracts the UMI of a record, or an empty string if it has none.
    #[must_use]
    pub fn umi_of(&self, record: &RecordBuf) -> String {
        match self {
            Self::Tag(tag) => match record.data().get(tag) {
                Some(Value::String(s)) => s.to_string(),
                _ => String::new(),
            },
            Self::ReadName(delimiter) => record
                .name()
                .map(|n| n.to_string())
                .and_then(|name| name.rsplit_once(*delimiter).map(|(_, umi)| umi.to_string()))
                .unwrap_or_default(),
        }
    }
}

/// Counts of the records seen while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadLoadStats {
    pub total: u64,
    pub loaded: u64,
    pub unmapped: u64,
    pub secondary: u64,
    pub supplementary: u64,
}

impl ReadLoadStats {
    /// Number of records skipped for any reason.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.unmapped + self.secondary + self.supplementary
    }
}

/// Opens a BAM file and reads its header.
///
/// # Errors
/// Returns an error if the file cannot be opened or the header cannot be read.
pub fn create_bam_reader<P: AsRef<Path>>(path: P) -> Result<(BamReader, Header)> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open input BAM: {}", path.display()))?;
    let mut reader = bam::io::Reader::new(file);
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header from: {}", path.display()))?;
    Ok((reader, header))
}

/// Creates a BAM file and writes the header.
///
/// # Errors
/// Returns an error if the file cannot be created or the header cannot be written.
pub fn create_bam_writer<P: AsRef<Path>>(path: P, header: &Header) -> Result<BamWriter> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output BAM: {}", path.display()))?;
    let mut writer = bam::io::Writer::new(file);
    writer
        .write_header(header)
        .with_context(|| format!("Failed to write header to: {}", path.display()))?;
    Ok(writer)
}

/// Contig names in header order.
#[must_use]
pub fn contig_names(header: &Header) -> Vec<String> {
    header.reference_sequences().keys().map(|name| name.to_string()).collect()
}

/// Returns a copy of `header` with a `@PG` record for this program appended.
///
/// The record's ID is `umiec`, suffixed with `.1`, `.2`, ... if already taken.
///
/// # Errors
/// Returns an error if the program record cannot be built or added.
pub fn with_program_record(header: &Header, version: &str, command_line: &str) -> Result<Header> {
    let mut header = header.clone();
    let programs = header.programs();
    let taken = |id: &str| programs.as_ref().contains_key(id.as_bytes());
    let id = std::iter::once("umiec".to_string())
        .chain((1..).map(|i| format!("umiec.{i}")))
        .find(|id| !taken(id))
        .unwrap_or_else(|| "umiec".to_string());

    let program = Map::<Program>::builder()
        .insert(pg_tag::NAME, "umiec")
        .insert(pg_tag::VERSION, version)
        .insert(pg_tag::COMMAND_LINE, command_line)
        .build()?;
    header.programs_mut().add(BString::from(id), program)?;
    Ok(header)
}

/// Converts a record into an [`AlignedRead`], or `None` if it is not a primary mapped
/// alignment.
///
/// Bases are uppercased; a record without qualities gets quality 30 on every base. Nothing
/// else is validated here.
#[must_use]
pub fn to_aligned_read(record: &RecordBuf, umi_source: &UmiSource) -> Option<AlignedRead> {
    let flags = record.flags();
    if flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary() {
        return None;
    }
    let contig_id = record.reference_sequence_id()?;
    let start = usize::from(record.alignment_start()?) - 1;

    let bases: Vec<u8> = record.sequence().as_ref().to_ascii_uppercase();
    let mut quals: Vec<u8> = record.quality_scores().as_ref().to_vec();
    if quals.is_empty() && !bases.is_empty() {
        quals = vec![30; bases.len()];
    }

    Some(AlignedRead {
        id: record.name().map(|n| n.to_string()).unwrap_or_default(),
        contig_id,
        start,
        cigar: record.cigar().as_ref().to_vec(),
        bases,
        quals,
        umi: umi_source.umi_of(record),
        strand: if flags.is_reverse_complemented() { Strand::Negative } else { Strand::Positive },
    })
}

/// Reads every record, keeping primary mapped alignments.
///
/// # Errors
/// Returns an error if a record cannot be decoded.
pub fn load_reads(
    reader: &mut BamReader,
    header: &Header,
    umi_source: &UmiSource,
) -> Result<(Vec<AlignedRead>, ReadLoadStats)> {
    let progress = ProgressTracker::new("Loaded records").with_interval(1_000_000);
    let mut stats = ReadLoadStats::default();
    let mut reads = Vec::new();

    for result in reader.record_bufs(header) {
        let record = result.context("Failed to read BAM record")?;
        stats.total += 1;
        progress.add(1);

        let flags = record.flags();
        if flags.is_unmapped() || record.reference_sequence_id().is_none() {
            stats.unmapped += 1;
        } else if flags.is_secondary() {
            stats.secondary += 1;
        } else if flags.is_supplementary() {
            stats.supplementary += 1;
        } else if let Some(read) = to_aligned_read(&record, umi_source) {
            stats.loaded += 1;
            reads.push(read);
        } else {
            stats.unmapped += 1;
        }
    }
    progress.finish();
    debug!("Loaded {} of {} records ({} skipped)", stats.loaded, stats.total, stats.skipped());
    Ok((reads, stats))
}

/// Builds the BAM record of a consensus read.
///
/// # Errors
/// Returns an error if the position cannot be represented.
pub fn consensus_to_record(consensus: &ConsensusRecord, umi_tag: Tag) -> Result<RecordBuf> {
    let mut record = RecordBuf::default();
    *record.name_mut() = Some(BString::from(consensus.read_name()));
    *record.flags_mut() = match consensus.strand {
        Strand::Negative => Flags::REVERSE_COMPLEMENTED,
        Strand::Positive => Flags::empty(),
    };
    *record.reference_sequence_id_mut() = Some(consensus.contig_id);
    *record.alignment_start_mut() = Some(
        Position::try_from(consensus.start + 1)
            .with_context(|| format!("Invalid consensus start {}", consensus.start))?,
    );
    *record.mapping_quality_mut() = MappingQuality::new(CONSENSUS_MAPPING_QUALITY);
    *record.cigar_mut() = consensus.cigar.iter().copied().collect();
    *record.sequence_mut() = consensus.bases.clone().into();
    *record.quality_scores_mut() = consensus.quals.clone().into();

    let family_size = i32::try_from(consensus.family_size).unwrap_or(i32::MAX);
    let data = record.data_mut();
    data.insert(umi_tag, Value::String(BString::from(consensus.umi.as_str())));
    data.insert(FAMILY_SIZE_TAG, Value::Int32(family_size));
    Ok(record)
}

/// Writes records to an open BAM writer.
///
/// # Errors
/// Returns an error if a record cannot be written.
pub fn write_records<'a>(
    writer: &mut BamWriter,
    header: &Header,
    records: impl IntoIterator<Item = &'a RecordBuf>,
) -> Result<u64> {
    let mut written = 0;
    for record in records {
        writer.write_alignment_record(header, record).context("Failed to write BAM record")?;
        written += 1;
    }
    Ok(written)
}

/// Flushes and closes a BAM writer.
///
/// # Errors
/// Returns an error if the final block cannot be written.
pub fn finish_bam_writer(mut writer: BamWriter) -> Result<()> {
    writer.get_mut().try_finish().context("Failed to finish BAM output")
}
