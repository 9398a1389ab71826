//! BED target files.
//!
//! Only the first four columns are used: contig, 0-based start, exclusive end and an optional
//! name. Blank lines and `#`, `track` and `browser` lines are skipped.

use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::{Result, UmiecError};

/// One BED interval, 0-based half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedInterval {
    pub contig: String,
    pub start: usize,
    pub end: usize,
    pub name: Option<String>,
}

/// Reads a BED file.
///
/// # Errors
/// Returns an error if the file cannot be read, or a [`UmiecError::SchedulingFailure`] for
/// a malformed line.
pub fn read_bed<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<BedInterval>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open BED file: {}", path.display()))?;
    let intervals = parse_bed(BufReader::new(file), &path.display().to_string())?;
    Ok(intervals)
}

/// Parses BED lines; `source` names the input in error messages.
///
/// # Errors
/// Returns [`UmiecError::SchedulingFailure`] for unreadable input, a line with fewer than
/// three columns, non-numeric coordinates, or an interval whose end is not after its start.
pub fn parse_bed<R: BufRead>(reader: R, source: &str) -> Result<Vec<BedInterval>> {
    let fail = |line_no: usize, reason: String| UmiecError::SchedulingFailure {
        reason: format!("{source} line {line_no}: {reason}"),
    };

    let mut intervals = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| fail(line_no, e.to_string()))?;
        let trimmed = line.trim_end();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }

        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < 3 {
            return Err(fail(line_no, format!("expected at least 3 columns, found {}", fields.len())));
        }
        let coordinate = |s: &str, what: &str| {
            s.trim().parse::<usize>().map_err(|_| fail(line_no, format!("invalid {what} '{s}'")))
        };
        let start = coordinate(fields[1], "start")?;
        let end = coordinate(fields[2], "end")?;
        if end <= start {
            return Err(fail(line_no, format!("end {end} is not after start {start}")));
        }
        let name = fields.get(3).map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string);

        intervals.push(BedInterval { contig: fields[0].to_string(), start, end, name });
    }
    Ok(intervals)
}
