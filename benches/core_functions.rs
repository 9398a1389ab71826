//! Benchmarks for barcode distance, clustering and consensus building.
//!
//! Run with: `cargo bench`
//! View reports in: `target/criterion/report/index.html`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use umiec_lib::consensus::{
    AlignedRead, ConsensusBuilder, ConsensusOptions, CountAccumulator, CountMode,
    DEFAULT_FAMILY_SIZES, Strand, parse_cigar,
};
use umiec_lib::umi::{
    ClusterOptions, ClusterPolicy, DistanceMetric, UmiClusterer, edit_distance, hamming_distance,
};

const BASES: [u8; 4] = *b"ACGT";

/// The `index`-th barcode of `len` bases in base-4 order.
fn barcode(index: usize, len: usize) -> String {
    let mut n = index;
    let mut bytes = vec![b'A'; len];
    for slot in bytes.iter_mut().rev() {
        *slot = BASES[n % 4];
        n /= 4;
    }
    String::from_utf8(bytes).unwrap()
}

/// Per-read barcodes: `n_distinct` true UMIs with depth 5 each, plus one sequencing error
/// per family in the last base.
fn raw_umis(n_distinct: usize, len: usize) -> Vec<String> {
    let mut umis = Vec::with_capacity(n_distinct * 6);
    for i in 0..n_distinct {
        // Spread true barcodes apart so errors rarely collide.
        let umi = barcode(i * 17, len);
        for _ in 0..5 {
            umis.push(umi.clone());
        }
        let mut error = umi.into_bytes();
        let last = error.len() - 1;
        error[last] = if error[last] == b'A' { b'C' } else { b'A' };
        umis.push(String::from_utf8(error).unwrap());
    }
    umis
}

fn family(depth: usize, len: usize) -> Vec<AlignedRead> {
    let cigar = parse_cigar(&format!("{len}M")).unwrap();
    (0..depth)
        .map(|i| {
            let mut bases: Vec<u8> = (0..len).map(|j| BASES[j % 4]).collect();
            // One discordant read in five.
            if i % 5 == 4 {
                bases[len / 2] = b'T';
            }
            AlignedRead {
                id: format!("read{i}"),
                contig_id: 0,
                start: 1000,
                cigar: cigar.clone(),
                bases,
                quals: vec![30; len],
                umi: "ACGTACGT".to_string(),
                strand: Strand::Positive,
            }
        })
        .collect()
}

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");
    let a = "ACGTACGTACGT";
    let b = "ACGTTCGTACGA";
    let shorter = "ACGTCGTACGT";

    group.bench_function("hamming_12bp", |bench| {
        bench.iter(|| black_box(hamming_distance(black_box(a), black_box(b))));
    });
    group.bench_function("edit_12bp", |bench| {
        bench.iter(|| black_box(edit_distance(black_box(a), black_box(b))));
    });
    group.bench_function("edit_12bp_vs_11bp", |bench| {
        bench.iter(|| black_box(edit_distance(black_box(a), black_box(shorter))));
    });
    group.bench_function("within_edit_threshold_1", |bench| {
        bench.iter(|| black_box(DistanceMetric::Edit.within(black_box(a), black_box(b), 1)));
    });
    group.finish();
}

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    for n_distinct in [10usize, 100, 1000] {
        let umis = raw_umis(n_distinct, 8);
        group.throughput(Throughput::Elements(umis.len() as u64));
        for (label, metric, policy) in [
            ("hamming_connected", DistanceMetric::Hamming, ClusterPolicy::Connected),
            ("edit_connected", DistanceMetric::Edit, ClusterPolicy::Connected),
            ("edit_directional", DistanceMetric::Edit, ClusterPolicy::Directional),
        ] {
            let clusterer = UmiClusterer::new(ClusterOptions {
                threshold: 1,
                metric,
                policy,
                ..ClusterOptions::default()
            });
            group.bench_with_input(BenchmarkId::new(label, n_distinct), &umis, |bench, umis| {
                bench.iter(|| black_box(clusterer.assign(umis).unwrap()));
            });
        }
    }
    group.finish();
}

fn bench_consensus(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus");
    for depth in [3usize, 20, 100] {
        let reads = family(depth, 150);
        let refs: Vec<&AlignedRead> = reads.iter().collect();
        group.throughput(Throughput::Elements(depth as u64));

        let builder = ConsensusBuilder::new(ConsensusOptions::default());
        group.bench_with_input(BenchmarkId::new("vote", depth), &refs, |bench, refs| {
            bench.iter(|| black_box(builder.call(refs, "ACGTACGT")));
        });

        let weighted = ConsensusBuilder::new(ConsensusOptions {
            quality_weighted: true,
            ..ConsensusOptions::default()
        });
        group.bench_with_input(BenchmarkId::new("quality_weighted", depth), &refs, |bench, refs| {
            bench.iter(|| black_box(weighted.call(refs, "ACGTACGT")));
        });

        let tallies = builder.call(&refs, "ACGTACGT").tallies;
        group.bench_with_input(BenchmarkId::new("count_family", depth), &tallies, |bench, t| {
            bench.iter(|| {
                let mut accumulator = CountAccumulator::new(&DEFAULT_FAMILY_SIZES, CountMode::Reads);
                accumulator.add_family(depth, t);
                black_box(accumulator.finish())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_distance, bench_clustering, bench_consensus);
criterion_main!(benches);
