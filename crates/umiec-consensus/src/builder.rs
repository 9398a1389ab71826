//! # Consensus Reads
//!
//! Collapses the reads of one UMI cluster (one source molecule) into a single consensus read
//! and reports, for every covered reference position, which allele each member showed.
//!
//! ## Algorithm
//!
//! The members are piled up over the reference window they jointly cover. At each position
//! `p`, the members *covering* `p` are those presenting a base or a deletion there.
//!
//! 1. **Deletion**: if at least `indel_frequency` of the covering members delete `p`, the
//!    consensus deletes `p` too.
//! 2. **Base**: otherwise members presenting a base vote (weight 1, or the base quality when
//!    quality weighting is on; bases under `min_base_quality` abstain). The allele with the
//!    highest weight is emitted if its share of the vote reaches `consensus_frequency`;
//!    otherwise the position is a no-call (`N`).
//! 3. **Insertion**: if at least `indel_frequency` of the covering members carry an insertion
//!    right after `p`, the consensus inserts bases there. The inserted length is the most
//!    common length among those members (ties go to the shorter), and each inserted base is
//!    voted like a backbone base among members with that length.
//!
//! Positions covered by no member (reference skips) become `N` operations in the CIGAR.
//! Leading and trailing deletions are trimmed so every consensus begins and ends with an
//! aligned base.
//!
//! ## Quality
//!
//! The quality of a called base is [`frequency_to_phred`] of its vote share; no-calls get
//! [`MIN_PHRED`].

use ahash::AHashMap;
use log::debug;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::counts::{Allele, ColumnTally, PositionCount};
use crate::phred::{MIN_PHRED, NO_CALL_BASE, frequency_to_phred};
use crate::read::{AlignedRead, Column, Strand};
use crate::ConsensusError;

/// Default minimum share of the vote a base needs to be called (60%).
pub const DEFAULT_CONSENSUS_FREQUENCY: f64 = 0.6;

/// Default minimum share of covering reads an indel needs to enter the consensus (60%).
pub const DEFAULT_INDEL_FREQUENCY: f64 = 0.6;

/// Parameters for [`ConsensusBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusOptions {
    /// Minimum vote share for a consensus base, in `(0, 1]`
    pub consensus_frequency: f64,
    /// Minimum share of covering reads for an insertion or deletion, in `(0, 1]`
    pub indel_frequency: f64,
    /// Weight votes by base quality instead of counting reads
    pub quality_weighted: bool,
    /// Bases below this quality do not vote (they are still counted)
    pub min_base_quality: u8,
}

impl Default for ConsensusOptions {
    fn default() -> Self {
        Self {
            consensus_frequency: DEFAULT_CONSENSUS_FREQUENCY,
            indel_frequency: DEFAULT_INDEL_FREQUENCY,
            quality_weighted: false,
            min_base_quality: 0,
        }
    }
}

/// One consensus read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusRecord {
    /// Index of the contig in the BAM header
    pub contig_id: usize,
    /// 0-based position of the first aligned base
    pub start: usize,
    /// Consensus bases
    pub bases: Vec<u8>,
    /// Consensus qualities
    pub quals: Vec<u8>,
    /// Alignment of the consensus to the reference
    pub cigar: Vec<Op>,
    /// Number of reads collapsed into this consensus
    pub family_size: usize,
    /// Representative UMI of the cluster
    pub umi: String,
    /// Majority strand of the members
    pub strand: Strand,
    /// Identifier of the region the family belongs to
    pub region_id: usize,
}

impl ConsensusRecord {
    /// Returns true for families of a single read.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.family_size == 1
    }

    /// The read name: `Consensus_read_{region}_{umi}_Count={n}`, or
    /// `Singleton_read_{region}_{umi}_Count=1` for single-read families.
    #[must_use]
    pub fn read_name(&self) -> String {
        let kind = if self.is_singleton() { "Singleton" } else { "Consensus" };
        format!("{kind}_read_{}_{}_Count={}", self.region_id, self.umi, self.family_size)
    }

    /// 0-based exclusive end on the reference.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start
            + self
                .cigar
                .iter()
                .filter(|op| matches!(op.kind(), Kind::Match | Kind::Deletion | Kind::Skip))
                .map(|op| op.len())
                .sum::<usize>()
    }
}

/// Parses the family size from a consensus read name ending in `Count={n}`.
///
/// # Examples
///
/// ```
/// use umiec_consensus::builder::family_size_from_name;
///
/// assert_eq!(family_size_from_name("Consensus_read_3_ACGT_Count=12"), Some(12));
/// assert_eq!(family_size_from_name("read1"), None);
/// ```
#[must_use]
pub fn family_size_from_name(name: &str) -> Option<usize> {
    name.rsplit_once("Count=").and_then(|(_, n)| n.parse().ok())
}

/// The consensus of one family plus its per-position tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyConsensus {
    /// The consensus read; `None` if the family covers no reference base
    pub record: Option<ConsensusRecord>,
    /// Per-position allele observations, ascending by position
    pub tallies: Vec<ColumnTally>,
}

/// Observations at one reference position.
#[derive(Debug, Default)]
struct PileupColumn {
    /// (member index, base, quality)
    bases: Vec<(usize, u8, u8)>,
    /// Member indices deleting this position
    deletions: Vec<usize>,
    /// (member index, inserted bases with qualities) for insertions after this position
    insertions: Vec<(usize, Vec<(u8, u8)>)>,
}

impl PileupColumn {
    fn depth(&self) -> usize {
        self.bases.len() + self.deletions.len()
    }
}

/// Builds consensus reads from clusters of aligned reads.
#[derive(Debug, Clone, Default)]
pub struct ConsensusBuilder {
    options: ConsensusOptions,
}

impl ConsensusBuilder {
    /// Creates a builder with the given options.
    #[must_use]
    pub fn new(options: ConsensusOptions) -> Self {
        Self { options }
    }

    /// The options this builder was created with.
    #[must_use]
    pub fn options(&self) -> &ConsensusOptions {
        &self.options
    }

    /// Builds the consensus of `reads`, all belonging to one UMI cluster on one contig.
    ///
    /// Returns a [`FamilyConsensus`] with no record and no tallies for an empty cluster;
    /// use [`ConsensusBuilder::call_non_empty`] to treat that as an error.
    #[must_use]
    pub fn call(&self, reads: &[&AlignedRead], umi: &str) -> FamilyConsensus {
        let Some(window_start) = reads.iter().map(|r| r.start).min() else {
            return FamilyConsensus { record: None, tallies: Vec::new() };
        };
        let window_end = reads.iter().map(|r| r.end()).max().unwrap_or(window_start);
        let pileup = pile_up(reads, window_start, window_end);

        // One entry per CIGAR unit, with the emitted base for read-consuming units
        let mut entries: Vec<(Kind, Option<(u8, u8)>)> = Vec::new();
        let mut tallies = Vec::new();

        for (offset, column) in pileup.iter().enumerate() {
            let ref_pos = window_start + offset;
            let depth = column.depth();
            if depth == 0 {
                entries.push((Kind::Skip, None));
                continue;
            }

            let deleted = self.passes_indel(column.deletions.len(), depth);
            let backbone = if deleted {
                entries.push((Kind::Deletion, None));
                Allele::Deletion
            } else {
                let (base, qual) = self.vote(column.bases.iter().map(|&(_, b, q)| (b, q)));
                entries.push((Kind::Match, Some((base, qual))));
                Allele::from_base(base)
            };

            let inserted = self.passes_indel(column.insertions.len(), depth);
            if inserted {
                for call in self.insertion_consensus(&column.insertions) {
                    entries.push((Kind::Insertion, Some(call)));
                }
            }

            tallies.push(ColumnTally {
                ref_pos,
                reads: tally_reads(column),
                consensus: if inserted { Allele::Insertion } else { backbone },
            });
        }

        let record = trim_to_aligned(&entries).map(|(lead, entries)| {
            let reverse = reads.iter().filter(|r| r.strand == Strand::Negative).count();
            let (bases, quals): (Vec<u8>, Vec<u8>) =
                entries.iter().filter_map(|(_, call)| *call).unzip();
            ConsensusRecord {
                contig_id: reads[0].contig_id,
                start: window_start + lead,
                bases,
                quals,
                cigar: collapse(entries.iter().map(|(kind, _)| *kind)),
                family_size: reads.len(),
                umi: umi.to_string(),
                strand: if 2 * reverse > reads.len() { Strand::Negative } else { Strand::Positive },
                region_id: 0,
            }
        });

        if record.is_none() {
            debug!("Family {umi} of {} reads has no aligned consensus base", reads.len());
        }
        FamilyConsensus { record, tallies }
    }

    /// Like [`ConsensusBuilder::call`], but an empty cluster is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConsensusError::EmptyClusterInput`] when `reads` is empty.
    pub fn call_non_empty(
        &self,
        reads: &[&AlignedRead],
        umi: &str,
    ) -> Result<FamilyConsensus, ConsensusError> {
        if reads.is_empty() {
            return Err(ConsensusError::EmptyClusterInput);
        }
        Ok(self.call(reads, umi))
    }

    #[allow(clippy::cast_precision_loss)]
    fn passes_indel(&self, count: usize, depth: usize) -> bool {
        count > 0 && count as f64 / depth as f64 >= self.options.indel_frequency
    }

    /// Votes one consensus base from (base, quality) observations.
    fn vote(&self, observations: impl Iterator<Item = (u8, u8)>) -> (u8, u8) {
        let mut weights = [0.0f64; 5];
        for (base, qual) in observations {
            if qual < self.options.min_base_quality {
                continue;
            }
            let idx = match Allele::from_base(base) {
                Allele::A => 0,
                Allele::C => 1,
                Allele::G => 2,
                Allele::T => 3,
                _ => 4,
            };
            weights[idx] += if self.options.quality_weighted { f64::from(qual) } else { 1.0 };
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return (NO_CALL_BASE, MIN_PHRED);
        }
        // First maximum wins, so ties resolve in A, C, G, T, N order.
        let (best, weight) = weights
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &w)| if w > acc.1 { (i, w) } else { acc });
        let frequency = weight / total;
        if best == 4 || frequency < self.options.consensus_frequency {
            return (NO_CALL_BASE, MIN_PHRED);
        }
        (b"ACGT"[best], frequency_to_phred(frequency))
    }

    fn insertion_consensus(&self, insertions: &[(usize, Vec<(u8, u8)>)]) -> Vec<(u8, u8)> {
        let mut by_len: AHashMap<usize, usize> = AHashMap::new();
        for (_, seq) in insertions {
            *by_len.entry(seq.len()).or_insert(0) += 1;
        }
        let Some(length) = by_len
            .into_iter()
            .max_by(|(la, ca), (lb, cb)| ca.cmp(cb).then(lb.cmp(la)))
            .map(|(len, _)| len)
        else {
            return Vec::new();
        };
        let chosen: Vec<&Vec<(u8, u8)>> =
            insertions.iter().map(|(_, seq)| seq).filter(|seq| seq.len() == length).collect();
        (0..length).map(|i| self.vote(chosen.iter().map(|seq| seq[i]))).collect()
    }
}

/// Piles up the members' columns over `[window_start, window_end)`.
fn pile_up(reads: &[&AlignedRead], window_start: usize, window_end: usize) -> Vec<PileupColumn> {
    let mut pileup: Vec<PileupColumn> =
        (window_start..window_end).map(|_| PileupColumn::default()).collect();
    for (member, read) in reads.iter().enumerate() {
        for column in read.columns() {
            match column {
                Column::Match { ref_pos, base, qual } => {
                    pileup[ref_pos - window_start].bases.push((member, base, qual));
                }
                Column::Deletion { ref_pos } => pileup[ref_pos - window_start].deletions.push(member),
                Column::Insertion { after_ref_pos, base, qual } => {
                    let insertions = &mut pileup[after_ref_pos - window_start].insertions;
                    match insertions.last_mut() {
                        Some((m, seq)) if *m == member => seq.push((base, qual)),
                        _ => insertions.push((member, vec![(base, qual)])),
                    }
                }
            }
        }
    }
    pileup
}

/// One allele per covering member: insertion if it inserts after the position, otherwise its
/// base or deletion.
fn tally_reads(column: &PileupColumn) -> PositionCount {
    let inserting: Vec<usize> = column.insertions.iter().map(|(m, _)| *m).collect();
    let mut counts = PositionCount::default();
    for &(member, base, _) in &column.bases {
        let allele =
            if inserting.contains(&member) { Allele::Insertion } else { Allele::from_base(base) };
        counts.add(allele, 1);
    }
    for member in &column.deletions {
        let allele = if inserting.contains(member) { Allele::Insertion } else { Allele::Deletion };
        counts.add(allele, 1);
    }
    counts
}

/// Drops units before the first and after the last aligned base, keeping insertions that
/// directly follow the last aligned base. Returns the number of reference positions dropped
/// from the front with the remaining units, or `None` if no base is aligned.
fn trim_to_aligned<T>(entries: &[(Kind, T)]) -> Option<(usize, &[(Kind, T)])> {
    let first = entries.iter().position(|(k, _)| *k == Kind::Match)?;
    let last = entries.iter().rposition(|(k, _)| *k == Kind::Match)?;
    let end = entries[last + 1..]
        .iter()
        .position(|(k, _)| *k != Kind::Insertion)
        .map_or(entries.len(), |n| last + 1 + n);
    let lead = entries[..first].iter().filter(|(k, _)| *k != Kind::Insertion).count();
    Some((lead, &entries[first..end]))
}

fn collapse(kinds: impl Iterator<Item = Kind>) -> Vec<Op> {
    let mut ops: Vec<Op> = Vec::new();
    for kind in kinds {
        match ops.last_mut() {
            Some(op) if op.kind() == kind => *op = Op::new(kind, op.len() + 1),
            _ => ops.push(Op::new(kind, 1)),
        }
    }
    ops
}
