//! Integration tests for umiec.
//!
//! These tests run the `umiec` binary on BAM files generated in temporary directories and
//! check the files it writes.

mod helpers;
mod test_consensus_command;
mod test_error_paths;
mod test_filter_command;
