//! Per-region consensus statistics.
//!
//! Every region contributes the list of its family sizes (singletons count as families of
//! size 1). From those lists this module derives:
//!
//! - the per-region histogram ([`HistRow`]),
//! - summary statistics per family-size threshold ([`SummaryRow`]), per region and overall,
//! - on-target coverage per threshold ([`TargetCoverageRow`]),
//! - the raw family-size histogram ([`FamilySizeCountRow`]).
//!
//! Threshold `0` describes raw reads: reads and UMIs both equal the total number of reads.
//! A threshold `f >= 1` keeps the families of size `>= f`: reads is the sum of their sizes,
//! UMIs is their number.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Metric, serialize_float};

/// Region id used for the row aggregating every region.
pub const OVERALL_REGION_ID: &str = "All";

/// Position label used for the row aggregating every region.
pub const OVERALL_POSITION: &str = "all_regions";

/// Consensus and singleton counts of one region (`.hist` file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistRow {
    /// Region id
    pub region_id: usize,
    /// Region interval as `contig:start-end` (1-based, inclusive)
    pub region: String,
    /// Region name, empty if unnamed
    pub name: String,
    /// Number of consensus reads built from families of size >= 2
    pub consensus: u64,
    /// Number of families of size 1
    pub singletons: u64,
}

impl Metric for HistRow {
    fn metric_name() -> &'static str {
        "region histogram"
    }
}

/// One line of the summary statistics: one region (or all regions) at one threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub region_id: String,
    pub position: String,
    pub name: String,
    pub family_size: usize,
    /// Reads at this threshold divided by the raw read count
    #[serde(serialize_with = "serialize_float")]
    pub fraction: f64,
    pub reads: u64,
    pub umis: u64,
}

impl Metric for SummaryRow {
    fn metric_name() -> &'static str {
        "summary statistics"
    }
}

/// UMIs in named regions versus all UMIs at one threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetCoverageRow {
    pub family_size: usize,
    pub on_target_umis: u64,
    pub all_umis: u64,
    #[serde(serialize_with = "serialize_float")]
    pub fraction: f64,
}

impl Metric for TargetCoverageRow {
    fn metric_name() -> &'static str {
        "target coverage"
    }
}

/// A region that produced no output, with the reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRegionRow {
    pub region_id: usize,
    pub region: String,
    pub name: String,
    pub reason: String,
}

impl Metric for FailedRegionRow {
    fn metric_name() -> &'static str {
        "failed regions"
    }
}

/// Number of families of a given size, across all regions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySizeCountRow {
    pub family_size: usize,
    pub count: u64,
}

impl Metric for FamilySizeCountRow {
    fn metric_name() -> &'static str {
        "family size counts"
    }
}

/// The family sizes observed in one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFamilySizes {
    pub region_id: String,
    /// Region interval label (`contig:start-end`)
    pub position: String,
    /// Region name; a non-empty name marks the region as on-target
    pub name: String,
    /// One entry per family, singletons included
    pub family_sizes: Vec<usize>,
}

impl RegionFamilySizes {
    /// Creates an empty entry for a region.
    #[must_use]
    pub fn new(region_id: impl Into<String>, position: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            region_id: region_id.into(),
            position: position.into(),
            name: name.into(),
            family_sizes: Vec::new(),
        }
    }

    /// Returns true if the region is a named (on-target) region.
    #[must_use]
    pub fn is_on_target(&self) -> bool {
        !self.name.is_empty()
    }

    /// Reads supporting families at the threshold.
    #[must_use]
    pub fn reads_at(&self, threshold: usize) -> u64 {
        let min = threshold.max(1);
        self.family_sizes.iter().filter(|&&s| s >= min).map(|&s| s as u64).sum()
    }

    /// UMIs at the threshold; at threshold 0 every raw read counts as one.
    #[must_use]
    pub fn umis_at(&self, threshold: usize) -> u64 {
        if threshold == 0 {
            self.reads_at(0)
        } else {
            self.family_sizes.iter().filter(|&&s| s >= threshold).count() as u64
        }
    }

    /// Number of families of size 1.
    #[must_use]
    pub fn singletons(&self) -> u64 {
        self.family_sizes.iter().filter(|&&s| s == 1).count() as u64
    }

    /// Number of families of size 2 or more.
    #[must_use]
    pub fn consensus(&self) -> u64 {
        self.family_sizes.iter().filter(|&&s| s >= 2).count() as u64
    }

    /// One summary line per threshold, threshold 0 first.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary_rows(&self, thresholds: &[usize]) -> Vec<SummaryRow> {
        let raw = self.reads_at(0);
        with_zero(thresholds)
            .into_iter()
            .map(|f| {
                let reads = self.reads_at(f);
                let fraction = if f == 0 {
                    1.0
                } else if raw == 0 {
                    0.0
                } else {
                    reads as f64 / raw as f64
                };
                SummaryRow {
                    region_id: self.region_id.clone(),
                    position: self.position.clone(),
                    name: self.name.clone(),
                    family_size: f,
                    fraction,
                    reads,
                    umis: self.umis_at(f),
                }
            })
            .collect()
    }
}

/// Returns the thresholds sorted, deduplicated and starting with 0.
pub(crate) fn with_zero(thresholds: &[usize]) -> Vec<usize> {
    let mut out: Vec<usize> = std::iter::once(0).chain(thresholds.iter().copied()).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Summary lines aggregating every region.
#[must_use]
pub fn overall_summary(regions: &[RegionFamilySizes], thresholds: &[usize]) -> Vec<SummaryRow> {
    let mut all = RegionFamilySizes::new(OVERALL_REGION_ID, OVERALL_POSITION, "");
    all.family_sizes = regions.iter().flat_map(|r| r.family_sizes.iter().copied()).collect();
    all.summary_rows(thresholds)
}

/// On-target versus all UMIs per threshold, threshold 0 first.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn target_coverage(regions: &[RegionFamilySizes], thresholds: &[usize]) -> Vec<TargetCoverageRow> {
    with_zero(thresholds)
        .into_iter()
        .map(|f| {
            let (on_target_umis, all_umis) = regions.iter().fold((0, 0), |(on, all), r| {
                let umis = r.umis_at(f);
                (if r.is_on_target() { on + umis } else { on }, all + umis)
            });
            let fraction = if all_umis == 0 { 0.0 } else { on_target_umis as f64 / all_umis as f64 };
            TargetCoverageRow { family_size: f, on_target_umis, all_umis, fraction }
        })
        .collect()
}

/// Number of families per size across all regions, ascending by size.
#[must_use]
pub fn family_size_histogram(regions: &[RegionFamilySizes]) -> Vec<FamilySizeCountRow> {
    let mut counts: BTreeMap<usize, u64> = BTreeMap::new();
    for &size in regions.iter().flat_map(|r| &r.family_sizes) {
        *counts.entry(size).or_default() += 1;
    }
    counts.into_iter().map(|(family_size, count)| FamilySizeCountRow { family_size, count }).collect()
}
