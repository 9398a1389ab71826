//! End-to-end CLI tests for the filter command.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

use crate::helpers::{create_header, create_read, create_umi_family, read_bam, read_name, write_bam};

fn run_umiec(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_umiec")).args(args).output().expect("Failed to run umiec")
}

fn run_filter(input: &Path, output: &Path, min_family_size: &str) -> Output {
    run_umiec(&[
        "filter",
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--min-family-size",
        min_family_size,
    ])
}

#[test]
fn test_filter_keeps_large_families() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("consensus.bam");
    let output = dir.path().join("filtered.bam");
    let records = vec![
        create_read("Consensus_read_0_AAAA_Count=10", 0, 100, "4M", "ACGT", "AAAA"),
        create_read("Consensus_read_0_CCCC_Count=2", 0, 100, "4M", "ACGT", "CCCC"),
        create_read("Consensus_read_1_GGGG_Count=3", 0, 200, "4M", "ACGT", "GGGG"),
        create_read("Singleton_read_1_TTTT_Count=1", 0, 200, "4M", "ACGT", "TTTT"),
        create_read("raw_read", 0, 300, "4M", "ACGT", "ACAC"),
    ];
    write_bam(&input, &create_header(&[("chr1", 1000)]), &records);

    let result = run_filter(&input, &output, "3");
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let (header, kept) = read_bam(&output);
    let names: Vec<String> = kept.iter().map(read_name).collect();
    assert_eq!(names, vec!["Consensus_read_0_AAAA_Count=10", "Consensus_read_1_GGGG_Count=3"]);
    assert!(header.programs().as_ref().contains_key(b"umiec".as_slice()));
}

#[test]
fn test_filter_after_consensus() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let mut reads = create_umi_family("AAAA", 6, "big", 101, "ACGTACGTAC");
    reads.extend(create_umi_family("GGGG", 2, "small", 101, "ACGTACGTAC"));
    write_bam(&input, &create_header(&[("chr1", 1000)]), &reads);

    let out = dir.path().join("out");
    let result = run_umiec(&[
        "consensus",
        "-i",
        input.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "-s",
        "s1",
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let filtered = dir.path().join("filtered.bam");
    let result = run_filter(&out.join("s1_consensus_reads.bam"), &filtered, "5");
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let (header, kept) = read_bam(&filtered);
    assert_eq!(kept.len(), 1);
    assert_eq!(read_name(&kept[0]), "Consensus_read_0_AAAA_Count=6");
    assert!(header.programs().as_ref().contains_key(b"umiec.1".as_slice()));
}

#[test]
fn test_filter_rejects_zero_min_family_size() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("consensus.bam");
    write_bam(&input, &create_header(&[("chr1", 1000)]), &[]);
    let result = run_filter(&input, &dir.path().join("out.bam"), "0");
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("min-family-size"));
}
