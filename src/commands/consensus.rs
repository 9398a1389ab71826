//! The full pipeline: UMI clustering, consensus reads and family-size stratified counts.
//!
//! Reads are loaded once, partitioned into regions (BED targets or blocks of coverage) and
//! processed region by region on a worker pool. Outputs are written in genomic order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};

use umiec_lib::bam_io::{
    consensus_to_record, contig_names, create_bam_reader, create_bam_writer, finish_bam_writer,
    load_reads, write_records,
};
use umiec_lib::bed::read_bed;
use umiec_lib::config::PipelineConfig;
use umiec_lib::count_table::CountTable;
use umiec_lib::consensus::{ConsensusOptions, CountMode, DEFAULT_FAMILY_SIZES};
use umiec_lib::logging::{OperationTimer, format_count, log_run_summary};
use umiec_lib::metrics::stats::{
    FailedRegionRow, RegionFamilySizes, family_size_histogram, overall_summary, target_coverage,
};
use umiec_lib::metrics::downsampling::{DOWNSAMPLING_SEED, downsampled_coverage};
use umiec_lib::metrics::writer::write_metrics_auto;
use umiec_lib::metrics::{CountRow, HistRow};
use umiec_lib::reference::ReferenceGenome;
use umiec_lib::region::{Partition, partition_by_coverage, partition_by_regions, regions_from_bed};
use umiec_lib::scheduler::{RegionScheduler, RunReport};
use umiec_lib::umi::{ClusterOptions, ClusterPolicy, DEFAULT_INDEX_THRESHOLD, DistanceMetric};
use umiec_lib::validation::{percent_to_fraction, validate_file_exists};

use crate::commands::command::Command;
use crate::commands::common::{ThreadingOptions, UmiOptions, add_pg_record};

/// Cluster reads by UMI and build consensus reads and allele counts.
#[derive(Debug, Parser)]
#[command(
    name = "consensus",
    about = "\x1b[38;5;72m[CONSENSUS]\x1b[0m      \x1b[36mCluster UMIs, build consensus reads and count alleles\x1b[0m",
    long_about = r#"
Cluster reads by UMI and build consensus reads and family-size stratified allele counts.

Reads sharing an alignment start are clustered by UMI; barcodes within the distance
threshold of each other are attributed to the same molecule. Each cluster (family) is
collapsed into one consensus read, and every covered position is counted once per
family-size threshold.

Regions are taken from a BED file (reads starting outside every interval are dropped as
off-target) or detected from blocks of overlapping reads. Regions are processed in
parallel; a region that fails is reported and does not affect the others.

Outputs, all prefixed with the sample name, in the output directory:
  {sample}_consensus_reads.bam      consensus reads with RX and cD tags
  {sample}.cons                     allele counts per position and family size
  {sample}.hist                     consensus and singleton counts per region
  {sample}_summary_statistics.txt   reads and UMIs per region and family size
  {sample}_target_coverage.txt      on-target UMIs per family size
  {sample}_downsampled_coverage.txt reads and UMIs at 10% to 100% of the reads
  {sample}_consensus_group_counts.txt  families per size (with --output-raw)
  {sample}_failed_regions.txt       regions that failed (only if any did)

Example usage:
  umiec consensus -i aligned.bam -o out -s patient1 -b targets.bed -r hg38.fa
  umiec consensus -i aligned.bam -o out -s patient1 --metric hamming -d 2 --threads 8
"#
)]
pub struct Consensus {
    /// Input BAM file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,

    /// Sample name, used as the prefix of every output file
    #[arg(short = 's', long = "sample-name", default_value = "sample")]
    pub sample_name: String,

    /// BED file of target regions; regions are detected from coverage if omitted
    #[arg(short = 'b', long = "bed")]
    pub bed: Option<PathBuf>,

    /// Reference FASTA for the reference column of the count table
    #[arg(short = 'r', long = "reference")]
    pub reference: Option<PathBuf>,

    #[command(flatten)]
    pub umi: UmiOptions,

    /// Barcode distance metric
    #[arg(long = "metric", value_enum, default_value_t = DistanceMetric::Edit)]
    pub metric: DistanceMetric,

    /// Maximum barcode distance within one family
    #[arg(short = 'd', long = "distance", default_value_t = 1)]
    pub distance: usize,

    /// How adjacent barcodes are merged
    #[arg(long = "cluster-policy", value_enum, default_value_t = ClusterPolicy::Connected)]
    pub cluster_policy: ClusterPolicy,

    /// Distinct barcodes at one position from which a BK-tree index is used
    #[arg(long = "index-threshold", default_value_t = DEFAULT_INDEX_THRESHOLD, hide = true)]
    pub index_threshold: usize,

    /// Minimum vote for a consensus base, in percent
    #[arg(short = 'c', long = "consensus-frequency", default_value_t = 60.0)]
    pub consensus_frequency: f64,

    /// Minimum share of covering reads for an insertion or deletion, in percent
    #[arg(long = "indel-frequency", default_value_t = 60.0)]
    pub indel_frequency: f64,

    /// Weight base votes by base quality
    #[arg(long = "quality-weighted", default_value_t = false)]
    pub quality_weighted: bool,

    /// Bases below this quality do not vote
    #[arg(short = 'q', long = "min-base-quality", default_value_t = 0)]
    pub min_base_quality: u8,

    /// Family-size thresholds of the count table and statistics
    #[arg(short = 'f', long = "family-sizes", value_delimiter = ',', default_values_t = DEFAULT_FAMILY_SIZES.to_vec())]
    pub family_sizes: Vec<usize>,

    /// How qualifying families are counted
    #[arg(long = "count-mode", value_enum, default_value_t = CountMode::Reads)]
    pub count_mode: CountMode,

    /// Write single-read families to the consensus BAM
    #[arg(long = "include-singletons", default_value_t = false)]
    pub include_singletons: bool,

    /// Maximum gap between reads of one detected region
    #[arg(long = "merge-gap", default_value_t = 0)]
    pub merge_gap: usize,

    /// Also write the number of families of each size
    #[arg(long = "output-raw", default_value_t = false)]
    pub output_raw: bool,

    /// Largest share of regions allowed to fail, 0 to 1
    #[arg(long = "max-failed-fraction", default_value_t = 0.0)]
    pub max_failed_fraction: f64,

    /// Per-region time limit in seconds
    #[arg(long = "region-timeout")]
    pub region_timeout: Option<u64>,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

/// The output files of one sample.
#[derive(Debug, Clone)]
struct OutputPaths {
    bam: PathBuf,
    counts: PathBuf,
    hist: PathBuf,
    summary: PathBuf,
    target_coverage: PathBuf,
    downsampled_coverage: PathBuf,
    family_size_counts: PathBuf,
    failed_regions: PathBuf,
}

impl OutputPaths {
    fn new(dir: &Path, sample: &str) -> Self {
        let path = |suffix: &str| dir.join(format!("{sample}{suffix}"));
        Self {
            bam: path("_consensus_reads.bam"),
            counts: path(".cons"),
            hist: path(".hist"),
            summary: path("_summary_statistics.txt"),
            target_coverage: path("_target_coverage.txt"),
            downsampled_coverage: path("_downsampled_coverage.txt"),
            family_size_counts: path("_consensus_group_counts.txt"),
            failed_regions: path("_failed_regions.txt"),
        }
    }
}

/// Tables collected from region outputs in region order.
#[derive(Debug, Default)]
struct Collected {
    count_rows: Vec<CountRow>,
    hist_rows: Vec<HistRow>,
    family_sizes: Vec<RegionFamilySizes>,
    records_written: u64,
}

impl Consensus {
    /// Converts the CLI options into a validated [`PipelineConfig`].
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            sample_name: self.sample_name.clone(),
            cluster: ClusterOptions {
                threshold: self.distance,
                metric: self.metric,
                policy: self.cluster_policy,
                index_threshold: self.index_threshold,
            },
            consensus: ConsensusOptions {
                consensus_frequency: percent_to_fraction(self.consensus_frequency)?,
                indel_frequency: percent_to_fraction(self.indel_frequency)?,
                quality_weighted: self.quality_weighted,
                min_base_quality: self.min_base_quality,
            },
            count_mode: self.count_mode,
            family_sizes: self.family_sizes.clone(),
            include_singletons: self.include_singletons,
            merge_gap: self.merge_gap,
            threads: self.threading.threads,
            max_failed_fraction: self.max_failed_fraction,
            region_timeout: self.region_timeout.map(Duration::from_secs),
            umi_source: self.umi.source()?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate_inputs(&self) -> Result<()> {
        validate_file_exists(&self.input, "Input BAM")?;
        if let Some(bed) = &self.bed {
            validate_file_exists(bed, "BED")?;
        }
        if let Some(reference) = &self.reference {
            validate_file_exists(reference, "Reference FASTA")?;
        }
        self.threading.validate()
    }
}

impl Command for Consensus {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.validate_inputs()?;
        let config = Arc::new(self.pipeline_config()?);
        let umi_tag = self.umi.output_tag()?;
        let timer = OperationTimer::new("Building consensus reads");

        info!("Starting Consensus");
        info!("Input: {}", self.input.display());
        info!("Output directory: {}", self.output_dir.display());
        info!("Sample: {}", config.sample_name);
        info!(
            "Clustering: {} distance <= {} ({:?})",
            config.cluster.metric, config.cluster.threshold, config.cluster.policy
        );
        info!("Family sizes: {:?}", config.thresholds());

        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.output_dir.display())
        })?;
        let paths = OutputPaths::new(&self.output_dir, &config.sample_name);

        let reference = match &self.reference {
            Some(path) => {
                info!("Loading reference from {}", path.display());
                Some(Arc::new(ReferenceGenome::from_path(path)?))
            }
            None => None,
        };

        let (mut reader, header) = create_bam_reader(&self.input)?;
        let contigs = contig_names(&header);
        let (reads, load_stats) = load_reads(&mut reader, &header, &config.umi_source)?;
        info!(
            "Loaded {} of {} records ({} skipped)",
            format_count(load_stats.loaded),
            format_count(load_stats.total),
            format_count(load_stats.skipped())
        );

        let partition: Partition = match &self.bed {
            Some(bed) => {
                let regions = regions_from_bed(read_bed(bed)?, &contigs)?;
                partition_by_regions(reads, regions)
            }
            None => partition_by_coverage(reads, &contigs, config.merge_gap)?,
        };
        if let Some(reference) = &reference {
            reference.require_contigs(partition.tasks.iter().map(|t| t.region.contig.as_str()))?;
        }
        info!("Processing {} regions", format_count(partition.tasks.len() as u64));

        let out_header = add_pg_record(&header, command_line)?;
        let mut writer = create_bam_writer(&paths.bam, &out_header)?;
        let mut collected = Collected::default();
        let regions = partition.tasks.iter().map(|t| t.region.clone()).collect();
        let mut count_table = CountTable::new(regions, Arc::clone(&config), reference);

        let scheduler = RegionScheduler::new(Arc::clone(&config));
        let report = scheduler.run(partition, |output| {
            let records = output
                .records
                .iter()
                .map(|r| consensus_to_record(r, umi_tag))
                .collect::<Result<Vec<_>>>()?;
            collected.records_written += write_records(&mut writer, &out_header, &records)?;
            collected.hist_rows.push(output.hist_row());
            collected.family_sizes.push(output.region_family_sizes());
            collected.count_rows.extend(count_table.add(&output.region, output.counts));
            Ok(())
        })?;
        collected.count_rows.extend(count_table.finish());
        finish_bam_writer(writer)?;

        write_tables(&paths, &config, &collected, &report, self.output_raw)?;
        log_run_summary(&report);

        if !report.within_tolerance(config.max_failed_fraction) {
            bail!(
                "{} of {} regions failed, more than the tolerated fraction of {}; see {}",
                report.failures.len(),
                report.total_regions,
                config.max_failed_fraction,
                paths.failed_regions.display()
            );
        }
        if !report.failures.is_empty() {
            warn!("Continuing with partial output; failed regions are listed in {}", paths.failed_regions.display());
        }

        timer.log_completion(collected.records_written, "consensus reads");
        Ok(())
    }
}

/// Writes every TSV output.
fn write_tables(
    paths: &OutputPaths,
    config: &PipelineConfig,
    collected: &Collected,
    report: &RunReport,
    output_raw: bool,
) -> Result<()> {
    let thresholds = config.thresholds();
    write_metrics_auto(&paths.counts, &collected.count_rows)?;
    write_metrics_auto(&paths.hist, &collected.hist_rows)?;

    let mut summary: Vec<_> =
        collected.family_sizes.iter().flat_map(|r| r.summary_rows(&thresholds)).collect();
    summary.extend(overall_summary(&collected.family_sizes, &thresholds));
    write_metrics_auto(&paths.summary, &summary)?;
    write_metrics_auto(&paths.target_coverage, &target_coverage(&collected.family_sizes, &thresholds))?;
    let downsampled =
        downsampled_coverage(&collected.family_sizes, &thresholds, DOWNSAMPLING_SEED);
    write_metrics_auto(&paths.downsampled_coverage, &downsampled)?;

    if output_raw {
        write_metrics_auto(&paths.family_size_counts, &family_size_histogram(&collected.family_sizes))?;
    }
    if !report.failures.is_empty() {
        let rows: Vec<FailedRegionRow> = report
            .failures
            .iter()
            .map(|f| FailedRegionRow {
                region_id: f.region.id,
                region: f.region.label(),
                name: f.region.name_or_empty().to_string(),
                reason: f.reason.clone(),
            })
            .collect();
        write_metrics_auto(&paths.failed_regions, &rows)?;
    }
    Ok(())
}
