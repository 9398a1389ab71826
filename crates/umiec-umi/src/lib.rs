#![deny(unsafe_code)]

//! UMI barcode utilities
//!
//! This crate provides:
//! - [`distance`]: Hamming and edit distance between barcodes
//! - [`index`]: a BK-tree for neighbour queries over many distinct barcodes
//! - [`cluster`]: error-tolerant clustering of the barcodes seen at one position

pub mod cluster;
pub mod distance;
pub mod index;

pub use cluster::{Assignment, ClusterOptions, ClusterPolicy, UmiCluster, UmiClusterer};
pub use distance::{DistanceError, DistanceMetric, edit_distance, hamming_distance};
pub use index::{BkTree, DEFAULT_INDEX_THRESHOLD};
