//! # Barcode Distances
//!
//! Two distance functions are used to decide whether two observed UMI barcodes may have come
//! from the same source molecule:
//!
//! - **Hamming distance**: the number of positions at which two equal-length barcodes differ.
//!   Comparing barcodes of different lengths is an error, never a silent coercion.
//! - **Edit distance**: the Levenshtein distance (unit-cost insertions, deletions and
//!   substitutions). Defined for any pair of barcodes and tolerant of indel errors in the
//!   barcode itself.
//!
//! Both are computed with [`triple_accel`], which vectorizes the comparison where the CPU
//! allows it. Barcodes are compared byte-wise and case-sensitively; callers are expected to
//! normalize case before clustering.

use thiserror::Error;

/// Errors raised while comparing barcodes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DistanceError {
    /// Hamming distance requested for barcodes of different lengths.
    #[error("Cannot compute Hamming distance between '{a}' (length {}) and '{b}' (length {})", .a.len(), .b.len())]
    LengthMismatch {
        /// The first barcode
        a: String,
        /// The second barcode
        b: String,
    },
}

/// The distance used to compare barcodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum DistanceMetric {
    /// Number of mismatching positions; barcodes must have equal length.
    Hamming,
    /// Levenshtein distance; barcodes may differ in length.
    #[default]
    Edit,
}

impl DistanceMetric {
    /// Computes the distance between two barcodes under this metric.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::LengthMismatch`] for the Hamming metric when the barcodes
    /// differ in length.
    pub fn distance(self, a: &str, b: &str) -> Result<usize, DistanceError> {
        match self {
            Self::Hamming => hamming_distance(a, b),
            Self::Edit => Ok(edit_distance(a, b)),
        }
    }

    /// Returns true when the two barcodes are within `threshold` of each other.
    ///
    /// # Errors
    ///
    /// Propagates [`DistanceError::LengthMismatch`] from the Hamming metric.
    pub fn within(self, a: &str, b: &str, threshold: usize) -> Result<bool, DistanceError> {
        match self {
            Self::Hamming => hamming_distance(a, b).map(|d| d <= threshold),
            // The length difference is a lower bound on the edit distance.
            Self::Edit if a.len().abs_diff(b.len()) > threshold => Ok(false),
            Self::Edit => Ok(edit_distance(a, b) <= threshold),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hamming => write!(f, "hamming"),
            Self::Edit => write!(f, "edit"),
        }
    }
}

/// Counts the positions at which two equal-length barcodes differ.
///
/// # Errors
///
/// Returns [`DistanceError::LengthMismatch`] if `a` and `b` have different lengths.
///
/// # Examples
///
/// ```
/// use umiec_umi::distance::hamming_distance;
///
/// assert_eq!(hamming_distance("AAAA", "AAAT").unwrap(), 1);
/// assert!(hamming_distance("AAAA", "AAA").is_err());
/// ```
pub fn hamming_distance(a: &str, b: &str) -> Result<usize, DistanceError> {
    if a.len() != b.len() {
        return Err(DistanceError::LengthMismatch { a: a.to_string(), b: b.to_string() });
    }
    Ok(triple_accel::hamming(a.as_bytes(), b.as_bytes()) as usize)
}

/// Levenshtein distance between two barcodes with unit costs.
///
/// # Examples
///
/// ```
/// use umiec_umi::distance::edit_distance;
///
/// assert_eq!(edit_distance("ACGT", "ACGT"), 0);
/// assert_eq!(edit_distance("ACGT", "AGT"), 1);
/// assert_eq!(edit_distance("ACGT", "TGCA"), 4);
/// ```
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    triple_accel::levenshtein(a.as_bytes(), b.as_bytes()) as usize
}
