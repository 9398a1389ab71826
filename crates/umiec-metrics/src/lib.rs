#![deny(unsafe_code)]

//! Output rows and TSV writer for umiec.
//!
//! This crate provides:
//! - [`Metric`] trait for row types written as TSV
//! - [`counts`]: the per-position count table (`.cons`) row
//! - [`stats`]: per-region histogram, summary statistics and target coverage
//! - [`downsampling`]: UMI coverage at reduced sequencing depth
//! - [`writer`]: TSV output through `fgoxide`

pub mod counts;
pub mod downsampling;
pub mod stats;
pub mod writer;

use serde::{Deserialize, Serialize, Serializer};

/// Number of decimal places used for float columns.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float value with the standard precision.
///
/// # Example
/// ```
/// use umiec_metrics::format_float;
/// assert_eq!(format_float(0.3), "0.300000");
/// assert_eq!(format_float(1.0), "1.000000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// Serializes a float with [`FLOAT_PRECISION`] decimals; for `#[serde(serialize_with)]`.
///
/// # Errors
///
/// Propagates errors from the serializer.
pub fn serialize_float<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_float(*value))
}

/// Formats a count with thousands separators.
///
/// # Example
/// ```
/// use umiec_metrics::format_count;
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(12), "12");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// A row type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone {
    /// Human-readable name for this row type, used in error messages and logging.
    fn metric_name() -> &'static str;
}

pub use counts::CountRow;
pub use downsampling::{DownsampledCoverageRow, downsampled_coverage};
pub use stats::{
    FailedRegionRow, FamilySizeCountRow, HistRow, RegionFamilySizes, SummaryRow,
    TargetCoverageRow, family_size_histogram, overall_summary, target_coverage,
};
pub use writer::{write_metrics, write_metrics_auto};
