//! TSV output for the row types in this crate.

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::Serialize;
use std::path::Path;

use crate::Metric;

/// Writes rows to a tab-separated file with a header line.
///
/// `description` names the table in the error message.
///
/// # Errors
/// Returns an error if the file cannot be created or written to
///
/// # Example
/// ```no_run
/// use umiec_metrics::writer::write_metrics;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Row {
///     size: usize,
///     count: u64,
/// }
///
/// let rows = vec![Row { size: 1, count: 3 }, Row { size: 2, count: 1 }];
/// write_metrics("sample.hist", &rows, "histogram").unwrap();
/// ```
pub fn write_metrics<P: AsRef<Path>, T: Serialize>(
    path: P,
    rows: &[T],
    description: &str,
) -> Result<()> {
    let path = path.as_ref();
    DelimFile::default()
        .write_tsv(&path, rows)
        .with_context(|| format!("Failed to write {description}: {}", path.display()))
}

/// Writes rows of a [`Metric`] type, naming the table after [`Metric::metric_name`].
///
/// # Errors
/// Returns an error if the file cannot be created or written to
pub fn write_metrics_auto<P: AsRef<Path>, T: Metric>(path: P, rows: &[T]) -> Result<()> {
    write_metrics(path, rows, T::metric_name())
}
