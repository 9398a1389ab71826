//! Custom error types for umiec operations.

use thiserror::Error;

/// Result type alias for umiec operations
pub type Result<T> = std::result::Result<T, UmiecError>;

/// Error type for umiec operations
#[derive(Error, Debug)]
pub enum UmiecError {
    /// A read failed validation
    #[error("Malformed read '{read}': {reason}")]
    MalformedRead {
        /// The read name
        read: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A region exceeded its processing deadline
    #[error("Region {region} exceeded its time limit of {seconds}s")]
    RegionTimeout {
        /// The region label
        region: String,
        /// The configured deadline in seconds
        seconds: u64,
    },

    /// The run was cancelled before the region started
    #[error("Region {region} was cancelled")]
    Cancelled {
        /// The region label
        region: String,
    },

    /// Regions could not be formed or dispatched
    #[error("Scheduling failed: {reason}")]
    SchedulingFailure {
        /// Explanation of the problem
        reason: String,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Invalid frequency threshold
    #[error("Invalid frequency threshold: {value} (must be between {min} and {max})")]
    InvalidFrequency {
        /// The invalid frequency value
        value: f64,
        /// Minimum valid value
        min: f64,
        /// Maximum valid value
        max: f64,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BAM", "BED")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Barcodes could not be compared
    #[error(transparent)]
    Distance(#[from] umiec_umi::DistanceError),

    /// Required reference sequence not found
    #[error("Reference sequence '{ref_name}' not found")]
    ReferenceNotFound {
        /// The reference sequence name
        ref_name: String,
    },
}

impl From<umiec_consensus::ConsensusError> for UmiecError {
    fn from(e: umiec_consensus::ConsensusError) -> Self {
        match e {
            umiec_consensus::ConsensusError::MalformedRead { read, reason } => {
                Self::MalformedRead { read, reason }
            }
            other => Self::MalformedRead { read: String::new(), reason: other.to_string() },
        }
    }
}
