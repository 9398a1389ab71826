//! CLI command implementations for umiec.
//!
//! - [`consensus`] - cluster UMIs, build consensus reads and count alleles per region
//! - [`filter`] - keep consensus reads from families of a minimum size

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::struct_excessive_bools
)]

pub mod command;
pub mod common;
pub mod consensus;
pub mod filter;
