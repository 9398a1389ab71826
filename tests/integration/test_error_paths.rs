//! Error path integration tests: invalid inputs must fail before any region is processed.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

use crate::helpers::{create_header, create_umi_family, write_bam, write_bed};

fn run_consensus(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_umiec"))
        .arg("consensus")
        .args(args)
        .output()
        .expect("Failed to run consensus command")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Writes a small valid input BAM and returns (dir, input path as string).
fn setup() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    write_bam(
        &input,
        &create_header(&[("chr1", 1000)]),
        &create_umi_family("AAAA", 3, "r", 101, "ACGTACGTAC"),
    );
    let input = input.to_str().unwrap().to_string();
    (dir, input)
}

#[test]
fn test_missing_input_bam() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.bam");
    let out = dir.path().join("out");
    let output = run_consensus(&["-i", missing.to_str().unwrap(), "-o", out.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("File does not exist"));
    assert!(!out.exists());
}

#[test]
fn test_consensus_frequency_out_of_range() {
    let (dir, input) = setup();
    let out = dir.path().join("out");
    let output = run_consensus(&["-i", &input, "-o", out.to_str().unwrap(), "-c", "150"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid frequency threshold"));
}

#[test]
fn test_invalid_umi_tag() {
    let (dir, input) = setup();
    let out = dir.path().join("out");
    let output = run_consensus(&["-i", &input, "-o", out.to_str().unwrap(), "--umi-tag", "R"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("umi-tag"));
}

#[test]
fn test_overlapping_bed_intervals() {
    let (dir, input) = setup();
    let bed = write_bed(dir.path(), &[("chr1", 0, 200, "a"), ("chr1", 150, 300, "b")]);
    let out = dir.path().join("out");
    let output =
        run_consensus(&["-i", &input, "-o", out.to_str().unwrap(), "-b", bed.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("overlap"));
    assert!(!out.join("sample_consensus_reads.bam").exists());
}

#[test]
fn test_bed_contig_not_in_header() {
    let (dir, input) = setup();
    let bed = write_bed(dir.path(), &[("chr7", 0, 200, "a")]);
    let out = dir.path().join("out");
    let output =
        run_consensus(&["-i", &input, "-o", out.to_str().unwrap(), "-b", bed.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("'chr7' is not in the BAM header"));
}

#[test]
fn test_malformed_bed_line() {
    let (dir, input) = setup();
    let bed = dir.path().join("bad.bed");
    fs::write(&bed, "chr1\t100\n").unwrap();
    let out = dir.path().join("out");
    let output =
        run_consensus(&["-i", &input, "-o", out.to_str().unwrap(), "-b", bed.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("line 1"));
}

#[test]
fn test_reference_missing_contig() {
    let (dir, input) = setup();
    let fasta = dir.path().join("ref.fa");
    fs::write(&fasta, ">chr2\nACGTACGTAC\n").unwrap();
    let out = dir.path().join("out");
    let output = run_consensus(&[
        "-i",
        &input,
        "-o",
        out.to_str().unwrap(),
        "-r",
        fasta.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Reference sequence 'chr1' not found"));
}
