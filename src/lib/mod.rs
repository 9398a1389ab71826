#![deny(unsafe_code)]
// Clippy lint configuration for CI
// - cast_*: counts and positions move between usize, u64, i32 and f64
// - missing_*_doc: error and panic sections are documented where non-obvious
// - needless_pass_by_value: tasks and partitions are handed over by value
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::too_many_lines,
    clippy::redundant_closure_for_method_calls,
    clippy::uninlined_format_args
)]

//! # umiec - UMI error correction library
//!
//! Clusters reads by UMI barcode at each alignment start, collapses each cluster into a
//! consensus read and counts alleles per position stratified by family size.
//!
//! ## Overview
//!
//! The algorithms live in workspace crates re-exported here:
//!
//! - **[`umi`]** - barcode distances and clustering
//! - **[`consensus`]** - aligned reads, consensus building and allele counting
//! - **[`metrics`]** - output row types and TSV writing
//!
//! This crate drives them over a BAM file:
//!
//! - **[`bam_io`]** - reading reads and writing consensus records with noodles
//! - **[`bed`]** and **[`region`]** - target intervals and partitioning reads into regions
//! - **[`worker`]** - processing one region
//! - **[`count_table`]** - merging region counts into count rows
//! - **[`scheduler`]** - running regions in parallel and merging them in genomic order
//! - **[`config`]** - the validated run configuration
//! - **[`reference`][mod@reference]** - reference bases for the count table
//! - **[`logging`]**, **[`progress`]** and **[`validation`]** - shared utilities
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use umiec_lib::bam_io::{UmiSource, contig_names, create_bam_reader, load_reads};
//! use umiec_lib::config::PipelineConfig;
//! use umiec_lib::region::partition_by_coverage;
//! use umiec_lib::scheduler::RegionScheduler;
//!
//! # fn main() -> anyhow::Result<()> {
//! let (mut reader, header) = create_bam_reader("aligned.bam")?;
//! let (reads, _) = load_reads(&mut reader, &header, &UmiSource::default())?;
//! let partition = partition_by_coverage(reads, &contig_names(&header), 0)?;
//!
//! let scheduler = RegionScheduler::new(Arc::new(PipelineConfig::default()));
//! let report = scheduler.run(partition, |output| {
//!     println!("{}: {} consensus reads", output.region, output.records.len());
//!     Ok(())
//! })?;
//! assert!(report.within_tolerance(0.0));
//! # Ok(())
//! # }
//! ```

pub mod bam_io;
pub mod bed;
pub mod config;
pub mod count_table;
pub mod errors;
pub mod logging;
pub mod progress;
pub mod reference;
pub mod region;
pub mod reorder_buffer;
pub mod scheduler;
pub mod validation;
pub mod worker;

pub use umiec_consensus as consensus;
pub use umiec_metrics as metrics;
pub use umiec_umi as umi;
