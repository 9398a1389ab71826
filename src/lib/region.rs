//! Genomic regions and the partitioning of reads into them.
//!
//! Regions are disjoint, 0-based half-open intervals. A read belongs to the region that
//! contains its alignment start. Regions come either from a BED file, in which case reads
//! starting outside every interval are off-target and dropped, or from the reads themselves
//! as blocks of overlapping coverage.

use ahash::AHashMap;
use std::fmt;

use umiec_consensus::AlignedRead;

use crate::bed::BedInterval;
use crate::errors::{Result, UmiecError};

/// A unit of work: one disjoint interval of one contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomicRegion {
    /// Index of the region in genomic order
    pub id: usize,
    pub contig: String,
    /// Index of the contig in the BAM header
    pub contig_id: usize,
    /// 0-based inclusive start
    pub start: usize,
    /// 0-based exclusive end
    pub end: usize,
    pub name: Option<String>,
}

impl GenomicRegion {
    /// `contig:start-end` in 1-based inclusive coordinates.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}-{}", self.contig, self.start + 1, self.end)
    }

    /// The region name, or an empty string.
    #[must_use]
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Returns true if the 0-based position on the contig lies inside the region.
    #[must_use]
    pub fn contains(&self, contig_id: usize, pos: usize) -> bool {
        self.contig_id == contig_id && self.start <= pos && pos < self.end
    }

    /// Number of reference bases in the region.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true for an empty interval.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({name})", self.label()),
            None => f.write_str(&self.label()),
        }
    }
}

/// A region together with the reads starting in it, sorted by start.
#[derive(Debug, Clone)]
pub struct RegionTask {
    pub region: GenomicRegion,
    pub reads: Vec<AlignedRead>,
}

/// The outcome of partitioning.
#[derive(Debug, Default)]
pub struct Partition {
    /// One task per region, in genomic order
    pub tasks: Vec<RegionTask>,
    /// Reads that start outside every region
    pub off_target_reads: u64,
}

/// Resolves BED intervals against the BAM contigs and orders them genomically.
///
/// # Errors
/// Returns [`UmiecError::SchedulingFailure`] if an interval names a contig missing from the
/// header, or if two intervals overlap.
pub fn regions_from_bed(intervals: Vec<BedInterval>, contigs: &[String]) -> Result<Vec<GenomicRegion>> {
    let index: AHashMap<&str, usize> =
        contigs.iter().enumerate().map(|(i, name)| (name.as_str(), i)).collect();

    let mut regions = intervals
        .into_iter()
        .map(|interval| {
            let contig_id = *index.get(interval.contig.as_str()).ok_or_else(|| {
                UmiecError::SchedulingFailure {
                    reason: format!("BED contig '{}' is not in the BAM header", interval.contig),
                }
            })?;
            Ok(GenomicRegion {
                id: 0,
                contig: interval.contig,
                contig_id,
                start: interval.start,
                end: interval.end,
                name: interval.name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    regions.sort_by_key(|r| (r.contig_id, r.start, r.end));
    for pair in regions.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.contig_id == b.contig_id && b.start < a.end {
            return Err(UmiecError::SchedulingFailure {
                reason: format!("BED intervals {a} and {b} overlap"),
            });
        }
    }
    for (id, region) in regions.iter_mut().enumerate() {
        region.id = id;
    }
    Ok(regions)
}

fn sort_reads(reads: &mut [AlignedRead]) {
    reads.sort_by_key(|r| (r.contig_id, r.start));
}

/// Distributes reads over fixed regions; reads starting outside every region are counted as
/// off-target and dropped. Every region gets a task, even without reads.
#[must_use]
pub fn partition_by_regions(mut reads: Vec<AlignedRead>, regions: Vec<GenomicRegion>) -> Partition {
    sort_reads(&mut reads);
    let mut tasks: Vec<RegionTask> =
        regions.into_iter().map(|region| RegionTask { region, reads: Vec::new() }).collect();
    let mut off_target_reads = 0;

    for read in reads {
        let key = (read.contig_id, read.start);
        let after = tasks.partition_point(|t| (t.region.contig_id, t.region.start) <= key);
        match after.checked_sub(1).map(|i| &mut tasks[i]) {
            Some(task) if task.region.contains(read.contig_id, read.start) => task.reads.push(read),
            _ => off_target_reads += 1,
        }
    }
    Partition { tasks, off_target_reads }
}

/// Builds regions from blocks of coverage.
///
/// Reads are sorted by contig and start; a block grows while each next read starts no more
/// than `merge_gap` bases past the block's current end.
///
/// # Errors
/// Returns [`UmiecError::SchedulingFailure`] if a read refers to a contig missing from
/// `contigs`.
pub fn partition_by_coverage(
    mut reads: Vec<AlignedRead>,
    contigs: &[String],
    merge_gap: usize,
) -> Result<Partition> {
    sort_reads(&mut reads);
    let mut tasks: Vec<RegionTask> = Vec::new();

    for read in reads {
        let (contig_id, start, end) = (read.contig_id, read.start, read.end());
        match tasks.last_mut() {
            Some(task)
                if task.region.contig_id == contig_id && start <= task.region.end + merge_gap =>
            {
                task.region.end = task.region.end.max(end);
                task.reads.push(read);
            }
            _ => {
                let contig = contigs.get(contig_id).cloned().ok_or_else(|| {
                    UmiecError::SchedulingFailure {
                        reason: format!("read '{}' refers to unknown contig {contig_id}", read.id),
                    }
                })?;
                let region =
                    GenomicRegion { id: tasks.len(), contig, contig_id, start, end, name: None };
                tasks.push(RegionTask { region, reads: vec![read] });
            }
        }
    }
    Ok(Partition { tasks, off_target_reads: 0 })
}
