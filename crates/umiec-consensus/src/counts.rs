//! Family-size stratified allele counts.
//!
//! For every reference position touched by a region, a [`PositionCount`] is kept per
//! configured family-size threshold `f`. A family (cluster) of size `n` contributes to every
//! threshold `f <= n`, so coverage never increases as the threshold grows.
//!
//! Each contributing observation is one [`Allele`]: a base, a deletion, or an insertion. A read
//! carrying an insertion right after a position is counted as `I` there *instead of* its
//! base, so `A + C + G + T + I + D + N == coverage` always holds.

use std::collections::BTreeMap;

/// Default family-size thresholds.
pub const DEFAULT_FAMILY_SIZES: [usize; 10] = [0, 1, 2, 3, 4, 5, 7, 10, 20, 30];

/// An allele observed at one reference position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Allele {
    A,
    C,
    G,
    T,
    /// Insertion immediately after the position
    Insertion,
    /// Deletion of the position
    Deletion,
    /// Any other base
    N,
}

impl Allele {
    /// All alleles in table order.
    pub const ALL: [Allele; 7] = [
        Allele::A,
        Allele::C,
        Allele::G,
        Allele::T,
        Allele::Insertion,
        Allele::Deletion,
        Allele::N,
    ];

    /// Alleles considered for the maximum non-reference allele, in tie-break order.
    pub const NON_REF_CANDIDATES: [Allele; 6] =
        [Allele::A, Allele::C, Allele::G, Allele::T, Allele::Insertion, Allele::Deletion];

    /// Maps a read base to its allele; anything outside `ACGT` (any case) is `N`.
    #[must_use]
    pub fn from_base(base: u8) -> Self {
        match base.to_ascii_uppercase() {
            b'A' => Allele::A,
            b'C' => Allele::C,
            b'G' => Allele::G,
            b'T' => Allele::T,
            _ => Allele::N,
        }
    }

    /// Single-character label used in output tables.
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Allele::A => 'A',
            Allele::C => 'C',
            Allele::G => 'G',
            Allele::T => 'T',
            Allele::Insertion => 'I',
            Allele::Deletion => 'D',
            Allele::N => 'N',
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// How families contribute to thresholds of one or more.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum CountMode {
    /// Every member read of a qualifying family is counted
    #[default]
    Reads,
    /// Each qualifying family is counted once, by its consensus allele; threshold 0 still
    /// counts raw reads
    Molecules,
}

/// Allele counts at one position and family-size threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionCount {
    counts: [u64; 7],
}

impl PositionCount {
    /// Adds `n` observations of `allele`.
    pub fn add(&mut self, allele: Allele, n: u64) {
        self.counts[allele.index()] += n;
    }

    /// Adds every count from `other`.
    pub fn merge(&mut self, other: &PositionCount) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts) {
            *mine += theirs;
        }
    }

    /// The number of observations of `allele`.
    #[must_use]
    pub fn get(&self, allele: Allele) -> u64 {
        self.counts[allele.index()]
    }

    /// Total observations.
    #[must_use]
    pub fn coverage(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Returns true if nothing has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coverage() == 0
    }

    /// The most frequent base among `A`, `C`, `G` and `T`, ties resolved in that order.
    /// `None` if no base was observed.
    #[must_use]
    pub fn majority_base(&self) -> Option<u8> {
        let mut best: Option<(Allele, u64)> = None;
        for allele in [Allele::A, Allele::C, Allele::G, Allele::T] {
            let n = self.get(allele);
            if n > 0 && best.is_none_or(|(_, m)| n > m) {
                best = Some((allele, n));
            }
        }
        best.map(|(allele, _)| allele.symbol() as u8)
    }

    /// The most frequent allele other than the reference base, with its count and its
    /// fraction of coverage.
    ///
    /// Candidates are `A, C, G, T, I, D` minus the reference allele; ties resolve in that
    /// order. When nothing non-reference was observed the first candidate is reported with a
    /// count of zero.
    #[must_use]
    pub fn max_non_ref(&self, ref_base: u8) -> (Allele, u64, f64) {
        let reference = Allele::from_base(ref_base);
        let mut best: Option<(Allele, u64)> = None;
        for allele in Allele::NON_REF_CANDIDATES.into_iter().filter(|a| *a != reference) {
            let n = self.get(allele);
            if best.is_none_or(|(_, m)| n > m) {
                best = Some((allele, n));
            }
        }
        let (allele, count) = best.unwrap_or((Allele::A, 0));
        let coverage = self.coverage();
        #[allow(clippy::cast_precision_loss)]
        let frequency = if coverage == 0 { 0.0 } else { count as f64 / coverage as f64 };
        (allele, count, frequency)
    }
}

/// The alleles observed at one position for one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTally {
    /// 0-based reference position
    pub ref_pos: usize,
    /// One observation per member read covering the position
    pub reads: PositionCount,
    /// The allele the consensus carries at this position
    pub consensus: Allele,
}

/// Finalized counts for one position, one entry per threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionCounts {
    /// 0-based reference position
    pub ref_pos: usize,
    /// Counts aligned with [`CountAccumulator::thresholds`]
    pub by_threshold: Vec<PositionCount>,
}

/// Accumulates family contributions per position and threshold.
///
/// Positions are kept in a sorted map so finalized positions can be drained in order while
/// a region is swept left to right.
#[derive(Debug, Clone)]
pub struct CountAccumulator {
    thresholds: Vec<usize>,
    mode: CountMode,
    positions: BTreeMap<usize, Vec<PositionCount>>,
}

impl CountAccumulator {
    /// Creates an accumulator; `thresholds` are sorted and de-duplicated.
    #[must_use]
    pub fn new(thresholds: &[usize], mode: CountMode) -> Self {
        let mut thresholds = thresholds.to_vec();
        thresholds.sort_unstable();
        thresholds.dedup();
        Self { thresholds, mode, positions: BTreeMap::new() }
    }

    /// The family-size thresholds, ascending.
    #[must_use]
    pub fn thresholds(&self) -> &[usize] {
        &self.thresholds
    }

    /// Adds one family's tallies.
    pub fn add_family(&mut self, family_size: usize, tallies: &[ColumnTally]) {
        let n_thresholds = self.thresholds.len();
        let qualifying = self.thresholds.iter().take_while(|&&f| f <= family_size).count();
        if qualifying == 0 {
            return;
        }
        for tally in tallies {
            let row = self
                .positions
                .entry(tally.ref_pos)
                .or_insert_with(|| vec![PositionCount::default(); n_thresholds]);
            for (idx, &threshold) in self.thresholds[..qualifying].iter().enumerate() {
                if threshold == 0 || self.mode == CountMode::Reads {
                    row[idx].merge(&tally.reads);
                } else {
                    row[idx].add(tally.consensus, 1);
                }
            }
        }
    }

    /// Merges another accumulator built with the same thresholds and mode.
    pub fn merge(&mut self, other: CountAccumulator) {
        debug_assert_eq!(self.thresholds, other.thresholds);
        for (pos, counts) in other.positions {
            match self.positions.get_mut(&pos) {
                Some(mine) => mine.iter_mut().zip(&counts).for_each(|(m, o)| m.merge(o)),
                None => {
                    self.positions.insert(pos, counts);
                }
            }
        }
    }

    /// Removes and returns all positions strictly before `pos`, in order.
    pub fn drain_before(&mut self, pos: usize) -> Vec<PositionCounts> {
        let rest = self.positions.split_off(&pos);
        let done = std::mem::replace(&mut self.positions, rest);
        done.into_iter().map(|(ref_pos, by_threshold)| PositionCounts { ref_pos, by_threshold }).collect()
    }

    /// Removes and returns every remaining position, in order.
    pub fn finish(&mut self) -> Vec<PositionCounts> {
        std::mem::take(&mut self.positions)
            .into_iter()
            .map(|(ref_pos, by_threshold)| PositionCounts { ref_pos, by_threshold })
            .collect()
    }

    /// Returns true if no position holds any count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
