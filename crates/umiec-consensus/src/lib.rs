#![deny(unsafe_code)]

//! Consensus calling for UMI families
//!
//! This crate provides:
//! - [`read`]: the aligned-read model and its per-position column view
//! - [`builder`]: collapsing one UMI cluster into a consensus read
//! - [`counts`]: allele counts stratified by family size
//! - [`phred`]: consensus quality helpers

pub mod builder;
pub mod counts;
pub mod phred;
pub mod read;

use thiserror::Error;

pub use builder::{
    ConsensusBuilder, ConsensusOptions, ConsensusRecord, DEFAULT_CONSENSUS_FREQUENCY,
    DEFAULT_INDEL_FREQUENCY, FamilyConsensus, family_size_from_name,
};
pub use counts::{
    Allele, ColumnTally, CountAccumulator, CountMode, DEFAULT_FAMILY_SIZES, PositionCount,
    PositionCounts,
};
pub use read::{AlignedRead, Column, Strand, parse_cigar};

/// Errors raised while validating reads or building a consensus.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsensusError {
    /// A read is internally inconsistent
    #[error("Malformed read '{read}': {reason}")]
    MalformedRead {
        /// Read name
        read: String,
        /// What is wrong with it
        reason: String,
    },

    /// A consensus was requested for a cluster with no reads
    #[error("Cannot build a consensus from an empty cluster")]
    EmptyClusterInput,

    /// A CIGAR string could not be parsed
    #[error("Invalid CIGAR '{cigar}': {reason}")]
    InvalidCigar {
        /// The CIGAR string
        cigar: String,
        /// Explanation
        reason: String,
    },
}
