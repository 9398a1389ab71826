//! The per-position allele count table (`.cons` file).

use serde::{Deserialize, Serialize};

use crate::{Metric, serialize_float};

/// One row of the count table: allele counts at one position for one family-size threshold.
///
/// Column names follow the established `.cons` layout so downstream variant callers can
/// read the table unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountRow {
    /// Sample name
    #[serde(rename = "Sample Name")]
    pub sample: String,
    /// Contig name
    #[serde(rename = "Contig")]
    pub contig: String,
    /// 1-based reference position
    #[serde(rename = "Position")]
    pub position: usize,
    /// Name of the region (target) containing the position, empty if unnamed
    #[serde(rename = "Name")]
    pub name: String,
    /// Reference base
    #[serde(rename = "Reference")]
    pub reference: char,
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "C")]
    pub c: u64,
    #[serde(rename = "G")]
    pub g: u64,
    #[serde(rename = "T")]
    pub t: u64,
    /// Insertions after the position
    #[serde(rename = "I")]
    pub i: u64,
    /// Deletions of the position
    #[serde(rename = "D")]
    pub d: u64,
    #[serde(rename = "N")]
    pub n: u64,
    /// Sum of all allele counts
    #[serde(rename = "Coverage")]
    pub coverage: u64,
    /// Family-size threshold of this row
    #[serde(rename = "Consensus group size")]
    pub family_size: usize,
    #[serde(rename = "Max Non-ref Allele Count")]
    pub max_non_ref_count: u64,
    #[serde(rename = "Max Non-ref Allele Frequency", serialize_with = "serialize_float")]
    pub max_non_ref_frequency: f64,
    #[serde(rename = "Max Non-ref Allele")]
    pub max_non_ref_allele: char,
}

impl Metric for CountRow {
    fn metric_name() -> &'static str {
        "count table"
    }
}

impl CountRow {
    /// Returns true if the allele counts add up to the coverage.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.a + self.c + self.g + self.t + self.i + self.d + self.n == self.coverage
    }
}
