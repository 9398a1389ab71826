//! Downsampled UMI coverage.
//!
//! Shows how many UMIs each region would retain at lower sequencing depth. For every rate
//! in [`DOWNSAMPLING_PERCENTS`] a region's reads are subsampled without replacement, the
//! surviving reads are regrouped into their original families, and reads and UMIs are
//! counted per family-size threshold as in the summary statistics.
//!
//! Subsampling uses a [`StdRng`] seeded once per table, so the table is reproducible for a
//! given input and seed.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::stats::{OVERALL_POSITION, OVERALL_REGION_ID, RegionFamilySizes, with_zero};
use crate::{Metric, serialize_float};

/// Sampling rates in percent of the reads of a region.
pub const DOWNSAMPLING_PERCENTS: [usize; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// Seed used for the downsampled coverage table.
pub const DOWNSAMPLING_SEED: u64 = 42;

/// Reads and UMIs of one region at one sampling rate and threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownsampledCoverageRow {
    pub region_id: String,
    pub position: String,
    pub name: String,
    /// Fraction of the region's reads kept
    #[serde(serialize_with = "serialize_float")]
    pub rate: f64,
    pub family_size: usize,
    pub reads: u64,
    pub umis: u64,
}

impl Metric for DownsampledCoverageRow {
    fn metric_name() -> &'static str {
        "downsampled coverage"
    }
}

impl RegionFamilySizes {
    /// Keeps `percent` of the region's reads, rounded down, and regroups them by family.
    ///
    /// Families that lose every read disappear; the others keep their relative order.
    #[must_use]
    pub fn downsample(&self, percent: usize, rng: &mut StdRng) -> RegionFamilySizes {
        let mut reads: Vec<usize> = self
            .family_sizes
            .iter()
            .enumerate()
            .flat_map(|(family, &size)| std::iter::repeat_n(family, size))
            .collect();
        let keep = reads.len() * percent.min(100) / 100;
        reads.shuffle(rng);
        reads.truncate(keep);

        let mut sizes = vec![0usize; self.family_sizes.len()];
        for family in reads {
            sizes[family] += 1;
        }
        sizes.retain(|&s| s > 0);
        RegionFamilySizes { family_sizes: sizes, ..self.clone() }
    }

    #[allow(clippy::cast_precision_loss)]
    fn downsampled_rows(&self, thresholds: &[usize], rng: &mut StdRng) -> Vec<DownsampledCoverageRow> {
        let mut rows = Vec::new();
        for percent in DOWNSAMPLING_PERCENTS {
            let sampled = self.downsample(percent, rng);
            for f in with_zero(thresholds) {
                rows.push(DownsampledCoverageRow {
                    region_id: self.region_id.clone(),
                    position: self.position.clone(),
                    name: self.name.clone(),
                    rate: percent as f64 / 100.0,
                    family_size: f,
                    reads: sampled.reads_at(f),
                    umis: sampled.umis_at(f),
                });
            }
        }
        rows
    }
}

/// Downsampled reads and UMIs per region, then for all regions together.
///
/// Rows are ordered by region, rate and threshold.
#[must_use]
pub fn downsampled_coverage(
    regions: &[RegionFamilySizes],
    thresholds: &[usize],
    seed: u64,
) -> Vec<DownsampledCoverageRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::new();
    for region in regions {
        rows.extend(region.downsampled_rows(thresholds, &mut rng));
    }

    let mut all = RegionFamilySizes::new(OVERALL_REGION_ID, OVERALL_POSITION, "");
    all.family_sizes = regions.iter().flat_map(|r| r.family_sizes.iter().copied()).collect();
    rows.extend(all.downsampled_rows(thresholds, &mut rng));
    rows
}
