//! Assertions and readers for command outputs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;

/// A TSV file as its header and rows keyed by column name.
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl Table {
    /// Rows whose `column` equals `value`.
    pub fn filter(&self, column: &str, value: &str) -> Vec<&HashMap<String, String>> {
        self.rows.iter().filter(|row| row[column] == value).collect()
    }
}

/// Reads a tab-separated file with a header line.
pub fn read_table(path: &Path) -> Table {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    let mut lines = text.lines();
    let columns: Vec<String> =
        lines.next().unwrap_or_default().split('\t').map(str::to_string).collect();
    let rows = lines
        .filter(|line| !line.is_empty())
        .map(|line| columns.iter().cloned().zip(line.split('\t').map(str::to_string)).collect())
        .collect();
    Table { columns, rows }
}

/// The read name as a string.
pub fn read_name(record: &RecordBuf) -> String {
    record.name().map(|n| n.to_string()).unwrap_or_default()
}

/// Asserts the RX tag of a record.
pub fn assert_rx_tag(record: &RecordBuf, expected: &str) {
    match record.data().get(&Tag::new(b'R', b'X')) {
        Some(Value::String(umi)) => assert_eq!(umi.to_string(), expected, "RX of {}", read_name(record)),
        other => panic!("Expected RX tag on {}, found {other:?}", read_name(record)),
    }
}

/// The family size stored in the cD tag.
pub fn family_size_tag(record: &RecordBuf) -> i64 {
    match record.data().get(&Tag::new(b'c', b'D')) {
        Some(Value::Int32(n)) => i64::from(*n),
        Some(Value::UInt8(n)) => i64::from(*n),
        Some(Value::Int8(n)) => i64::from(*n),
        Some(Value::UInt16(n)) => i64::from(*n),
        Some(Value::Int16(n)) => i64::from(*n),
        Some(Value::UInt32(n)) => i64::from(*n),
        other => panic!("Expected integer cD tag on {}, found {other:?}", read_name(record)),
    }
}
