//! End-to-end CLI tests for the consensus command.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use noodles::sam::alignment::record_buf::RecordBuf;
use tempfile::TempDir;

use crate::helpers::{
    assert_rx_tag, create_header, create_read, create_umi_family, family_size_tag, read_bam,
    read_name, read_table, write_bam, write_bed, write_fasta,
};

const COUNT_COLUMNS: [&str; 17] = [
    "Sample Name",
    "Contig",
    "Position",
    "Name",
    "Reference",
    "A",
    "C",
    "G",
    "T",
    "I",
    "D",
    "N",
    "Coverage",
    "Consensus group size",
    "Max Non-ref Allele Count",
    "Max Non-ref Allele Frequency",
    "Max Non-ref Allele",
];

/// A family of 10 reads at 101 (7 C / 3 T at 105), a family of 5 at 101 and a singleton at
/// 301.
fn standard_reads() -> Vec<RecordBuf> {
    let mut reads = create_umi_family("AAAA", 7, "fam1_c", 101, "ACGTCCGTAC");
    reads.extend(create_umi_family("AAAA", 3, "fam1_t", 101, "ACGTTCGTAC"));
    reads.extend(create_umi_family("GGGG", 5, "fam2", 101, "ACGTACGTAC"));
    reads.extend(create_umi_family("TTTT", 1, "single", 301, "TTTTTTTTTT"));
    reads
}

fn write_input(dir: &Path, reads: &[RecordBuf]) -> PathBuf {
    let path = dir.join("input.bam");
    write_bam(&path, &create_header(&[("chr1", 1000)]), reads);
    path
}

fn run_consensus(input: &Path, out: &Path, extra: &[&str]) -> Output {
    let mut args = vec![
        "consensus".to_string(),
        "--input".to_string(),
        input.display().to_string(),
        "--output-dir".to_string(),
        out.display().to_string(),
        "--sample-name".to_string(),
        "s1".to_string(),
    ];
    args.extend(extra.iter().map(|s| (*s).to_string()));
    Command::new(env!("CARGO_BIN_EXE_umiec"))
        .args(&args)
        .output()
        .expect("Failed to run consensus command")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "consensus failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_consensus_basic_outputs() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), &standard_reads());
    let out = dir.path().join("out");
    assert_success(&run_consensus(&input, &out, &[]));

    let (header, records) = read_bam(&out.join("s1_consensus_reads.bam"));
    assert!(header.programs().as_ref().contains_key(b"umiec".as_slice()));
    let names: Vec<String> = records.iter().map(read_name).collect();
    assert_eq!(names, vec!["Consensus_read_0_AAAA_Count=10", "Consensus_read_0_GGGG_Count=5"]);
    assert_eq!(records[0].sequence().as_ref(), b"ACGTCCGTAC");
    assert_rx_tag(&records[0], "AAAA");
    assert_eq!(family_size_tag(&records[0]), 10);
    assert_eq!(family_size_tag(&records[1]), 5);

    let counts = read_table(&out.join("s1.cons"));
    assert_eq!(counts.columns, COUNT_COLUMNS);
    let at_105: Vec<_> = counts.filter("Position", "105");
    let raw = at_105.iter().find(|r| r["Consensus group size"] == "0").unwrap();
    assert_eq!((raw["A"].as_str(), raw["C"].as_str(), raw["T"].as_str()), ("5", "7", "3"));
    assert_eq!(raw["Reference"], "C");
    assert_eq!(raw["Coverage"], "15");
    let ten = at_105.iter().find(|r| r["Consensus group size"] == "10").unwrap();
    assert_eq!((ten["C"].as_str(), ten["T"].as_str(), ten["Coverage"].as_str()), ("7", "3", "10"));
    assert_eq!(ten["Max Non-ref Allele"], "T");
    assert_eq!(ten["Max Non-ref Allele Count"], "3");
    assert_eq!(ten["Max Non-ref Allele Frequency"], "0.300000");
    assert!(at_105.iter().all(|r| r["Consensus group size"] != "20"));
    assert!(counts.rows.iter().all(|r| r["Sample Name"] == "s1" && r["Contig"] == "chr1"));

    let hist = read_table(&out.join("s1.hist"));
    assert_eq!(hist.rows.len(), 2);
    assert_eq!(hist.rows[0]["region"], "chr1:101-110");
    assert_eq!((hist.rows[0]["consensus"].as_str(), hist.rows[0]["singletons"].as_str()), ("2", "0"));
    assert_eq!((hist.rows[1]["consensus"].as_str(), hist.rows[1]["singletons"].as_str()), ("0", "1"));

    let summary = read_table(&out.join("s1_summary_statistics.txt"));
    let all = summary.filter("region_id", "All");
    assert_eq!(all.len(), 10);
    let all_at = |f: &str| all.iter().find(|r| r["family_size"] == f).unwrap();
    assert_eq!((all_at("0")["reads"].as_str(), all_at("0")["umis"].as_str()), ("16", "16"));
    assert_eq!(all_at("0")["fraction"], "1.000000");
    assert_eq!((all_at("10")["reads"].as_str(), all_at("10")["umis"].as_str()), ("10", "1"));
    assert_eq!(all_at("10")["fraction"], "0.625000");
    assert_eq!(all_at("1")["umis"], "3");

    let coverage = read_table(&out.join("s1_target_coverage.txt"));
    let at_one = coverage.filter("family_size", "1");
    assert_eq!((at_one[0]["on_target_umis"].as_str(), at_one[0]["all_umis"].as_str()), ("0", "3"));

    let downsampled = read_table(&out.join("s1_downsampled_coverage.txt"));
    let all = downsampled.filter("region_id", "All");
    assert_eq!(all.len(), 10 * 10);
    let raw_at = |rate: &str| {
        all.iter().find(|r| r["rate"] == rate && r["family_size"] == "0").unwrap()["reads"].clone()
    };
    assert_eq!(raw_at("1.000000"), "16");
    assert_eq!(raw_at("0.500000"), "8");
    assert_eq!(raw_at("0.100000"), "1");

    assert!(!out.join("s1_failed_regions.txt").exists());
    assert!(!out.join("s1_consensus_group_counts.txt").exists());
}

#[test]
fn test_consensus_counts_reads_crossing_adjacent_targets() {
    let dir = TempDir::new().unwrap();
    let mut reads = create_umi_family("AAAA", 3, "cross", 195, "ACGTACGTAC");
    reads.extend(create_umi_family("CCCC", 2, "second", 201, "GTAC"));
    let input = write_input(dir.path(), &reads);
    let bed = write_bed(dir.path(), &[("chr1", 100, 200, "AMP1"), ("chr1", 200, 300, "AMP2")]);
    let out = dir.path().join("out");
    assert_success(&run_consensus(&input, &out, &["--bed", bed.to_str().unwrap()]));

    let counts = read_table(&out.join("s1.cons"));
    let raw: Vec<(String, String, String)> = counts
        .filter("Consensus group size", "0")
        .iter()
        .map(|r| (r["Position"].clone(), r["Name"].clone(), r["Coverage"].clone()))
        .collect();
    let expected: Vec<(String, String, String)> = (195..=204)
        .map(|pos| {
            let name = if pos <= 200 { "AMP1" } else { "AMP2" };
            let coverage = if (201..=204).contains(&pos) { 5 } else { 3 };
            (pos.to_string(), name.to_string(), coverage.to_string())
        })
        .collect();
    assert_eq!(raw, expected);
}

#[test]
fn test_consensus_include_singletons_and_raw_counts() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), &standard_reads());
    let out = dir.path().join("out");
    assert_success(&run_consensus(&input, &out, &["--include-singletons", "--output-raw"]));

    let (_, records) = read_bam(&out.join("s1_consensus_reads.bam"));
    assert_eq!(records.len(), 3);
    assert_eq!(read_name(&records[2]), "Singleton_read_1_TTTT_Count=1");

    let raw = read_table(&out.join("s1_consensus_group_counts.txt"));
    let sizes: Vec<(String, String)> = raw
        .rows
        .iter()
        .map(|r| (r["family_size"].clone(), r["count"].clone()))
        .collect();
    assert_eq!(
        sizes,
        vec![
            ("1".to_string(), "1".to_string()),
            ("5".to_string(), "1".to_string()),
            ("10".to_string(), "1".to_string()),
        ]
    );
}

#[test]
fn test_consensus_with_bed_and_reference() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), &standard_reads());
    let bed = write_bed(dir.path(), &[("chr1", 90, 200, "AMP1"), ("chr1", 500, 600, "AMP2")]);
    let fasta = write_fasta(dir.path(), "chr1", &"A".repeat(1000));
    let out = dir.path().join("out");
    assert_success(&run_consensus(
        &input,
        &out,
        &["--bed", bed.to_str().unwrap(), "--reference", fasta.to_str().unwrap()],
    ));

    let counts = read_table(&out.join("s1.cons"));
    assert!(counts.rows.iter().all(|r| r["Name"] == "AMP1" && r["Reference"] == "A"));
    let raw = counts
        .rows
        .iter()
        .find(|r| r["Position"] == "105" && r["Consensus group size"] == "0")
        .unwrap();
    assert_eq!(raw["Max Non-ref Allele"], "C");
    assert_eq!(raw["Max Non-ref Allele Count"], "7");

    let hist = read_table(&out.join("s1.hist"));
    let names: Vec<&str> = hist.rows.iter().map(|r| r["name"].as_str()).collect();
    assert_eq!(names, vec!["AMP1", "AMP2"]);
    assert_eq!(hist.rows[0]["region"], "chr1:91-200");
    assert_eq!(hist.rows[1]["consensus"], "0");

    let coverage = read_table(&out.join("s1_target_coverage.txt"));
    let at_one = coverage.filter("family_size", "1");
    assert_eq!((at_one[0]["on_target_umis"].as_str(), at_one[0]["all_umis"].as_str()), ("2", "2"));
    assert_eq!(at_one[0]["fraction"], "1.000000");
}

#[test]
fn test_consensus_molecule_count_mode() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), &standard_reads());
    let out = dir.path().join("out");
    assert_success(&run_consensus(&input, &out, &["--count-mode", "molecules"]));

    let counts = read_table(&out.join("s1.cons"));
    let at = |f: &str| {
        counts.rows.iter().find(|r| r["Position"] == "105" && r["Consensus group size"] == f).unwrap()
    };
    assert_eq!(at("0")["Coverage"], "15");
    assert_eq!((at("1")["C"].as_str(), at("1")["A"].as_str(), at("1")["Coverage"].as_str()), ("1", "1", "2"));
    assert_eq!((at("10")["C"].as_str(), at("10")["Coverage"].as_str()), ("1", "1"));
}

#[test]
fn test_consensus_umi_from_read_name() {
    let dir = TempDir::new().unwrap();
    let reads: Vec<RecordBuf> = (0..4)
        .map(|i| create_read(&format!("M01:1:{i}_CAGT"), 0, 11, "6M", "ACGTAC", "NNNN"))
        .collect();
    let input = write_input(dir.path(), &reads);
    let out = dir.path().join("out");
    assert_success(&run_consensus(&input, &out, &["--umi-from-name"]));

    let (_, records) = read_bam(&out.join("s1_consensus_reads.bam"));
    assert_eq!(records.len(), 1);
    assert_rx_tag(&records[0], "CAGT");
    assert_eq!(read_name(&records[0]), "Consensus_read_0_CAGT_Count=4");
}

#[test]
fn test_corrupt_region_fails_only_that_region() {
    let dir = TempDir::new().unwrap();
    let mut reads = standard_reads();
    reads.push(create_read("corrupt", 0, 305, "4M", "ACGT", ""));
    let input = write_input(dir.path(), &reads);

    let strict = dir.path().join("strict");
    let output = run_consensus(&input, &strict, &[]);
    assert!(!output.status.success(), "a failed region must fail the run by default");
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 2 regions failed"));
    assert!(strict.join("s1_failed_regions.txt").exists());

    let tolerant = dir.path().join("tolerant");
    assert_success(&run_consensus(&input, &tolerant, &["--max-failed-fraction", "0.5"]));
    let failed = read_table(&tolerant.join("s1_failed_regions.txt"));
    assert_eq!(failed.rows.len(), 1);
    assert_eq!(failed.rows[0]["region"], "chr1:301-310");
    assert!(failed.rows[0]["reason"].contains("corrupt"));

    let (_, records) = read_bam(&tolerant.join("s1_consensus_reads.bam"));
    assert_eq!(records.len(), 2);
    let hist = read_table(&tolerant.join("s1.hist"));
    assert_eq!(hist.rows.len(), 1);
    assert_eq!(hist.rows[0]["consensus"], "2");
}

#[test]
fn test_hamming_with_mixed_umi_lengths_fails_region() {
    let dir = TempDir::new().unwrap();
    let mut reads = create_umi_family("AAAA", 3, "short", 101, "ACGTACGTAC");
    reads.extend(create_umi_family("AAAAT", 3, "long", 101, "ACGTACGTAC"));
    let input = write_input(dir.path(), &reads);
    let out = dir.path().join("out");

    let output = run_consensus(&input, &out, &["--metric", "hamming"]);
    assert!(!output.status.success());
    let failed = read_table(&out.join("s1_failed_regions.txt"));
    assert!(failed.rows[0]["reason"].contains("length"));

    let edit = dir.path().join("edit");
    assert_success(&run_consensus(&input, &edit, &["--metric", "edit"]));
    let (_, records) = read_bam(&edit.join("s1_consensus_reads.bam"));
    assert_eq!(records.len(), 1);
    assert_eq!(family_size_tag(&records[0]), 6);
}

#[test]
fn test_thread_count_does_not_change_output() {
    let dir = TempDir::new().unwrap();
    let umis = ["ACGT", "TGCA", "GGAA", "CCTT"];
    let mut reads = Vec::new();
    for block in 0..12 {
        let start = 1 + block * 60;
        for (i, umi) in umis.iter().enumerate() {
            let depth = 1 + (block + i) % 4;
            reads.extend(create_umi_family(umi, depth, &format!("b{block}_{umi}"), start + i, "ACGTACGTACGTACGTACGT"));
        }
    }
    let input = write_input(dir.path(), &reads);

    let single = dir.path().join("single");
    let multi = dir.path().join("multi");
    assert_success(&run_consensus(&input, &single, &["--threads", "1"]));
    assert_success(&run_consensus(&input, &multi, &["--threads", "4"]));

    for file in [
        "s1.cons",
        "s1.hist",
        "s1_summary_statistics.txt",
        "s1_target_coverage.txt",
        "s1_downsampled_coverage.txt",
    ] {
        let a = std::fs::read_to_string(single.join(file)).unwrap();
        let b = std::fs::read_to_string(multi.join(file)).unwrap();
        assert_eq!(a, b, "{file} differs between thread counts");
    }
    let (_, a) = read_bam(&single.join("s1_consensus_reads.bam"));
    let (_, b) = read_bam(&multi.join("s1_consensus_reads.bam"));
    let key = |r: &RecordBuf| (read_name(r), r.alignment_start());
    assert_eq!(a.iter().map(key).collect::<Vec<_>>(), b.iter().map(key).collect::<Vec<_>>());
    assert_eq!(read_table(&single.join("s1.hist")).rows.len(), 12);
}
