//! Processing of one region: clustering, consensus and counting.
//!
//! A worker owns the reads of its region and shares nothing mutable. Reads are swept in
//! order of their start position; the reads starting at one position are clustered by UMI,
//! each cluster is collapsed into a consensus read, and the cluster's per-position tallies
//! are added to a [`CountAccumulator`]. Counts cover every position the region's reads
//! reach, including positions past the region end; see [`crate::count_table`].

use std::time::Instant;

use itertools::Itertools;
use log::debug;

use umiec_consensus::{AlignedRead, ConsensusBuilder, ConsensusRecord, CountAccumulator};
use umiec_metrics::{HistRow, RegionFamilySizes};
use umiec_umi::UmiClusterer;

use crate::config::PipelineConfig;
use crate::errors::{Result, UmiecError};
use crate::region::{GenomicRegion, RegionTask};

/// Everything one region contributes to the run's outputs.
#[derive(Debug, Clone)]
pub struct RegionOutput {
    pub region: GenomicRegion,
    /// Consensus reads ordered by start, then creation order
    pub records: Vec<ConsensusRecord>,
    /// Allele counts of every position covered by the region's families
    pub counts: CountAccumulator,
    /// Size of every family, singletons included, whether written or not
    pub family_sizes: Vec<usize>,
}

impl RegionOutput {
    /// The family sizes labelled with the region.
    #[must_use]
    pub fn region_family_sizes(&self) -> RegionFamilySizes {
        RegionFamilySizes {
            region_id: self.region.id.to_string(),
            position: self.region.label(),
            name: self.region.name_or_empty().to_string(),
            family_sizes: self.family_sizes.clone(),
        }
    }

    /// The histogram line of the region.
    #[must_use]
    pub fn hist_row(&self) -> HistRow {
        HistRow {
            region_id: self.region.id,
            region: self.region.label(),
            name: self.region.name_or_empty().to_string(),
            consensus: self.family_sizes.iter().filter(|&&n| n > 1).count() as u64,
            singletons: self.family_sizes.iter().filter(|&&n| n == 1).count() as u64,
        }
    }
}

/// Builds the consensus reads, allele counts and family sizes of one region.
///
/// `deadline` is checked before each start position.
///
/// # Errors
/// Fails the region on a malformed read, on barcodes the metric cannot compare, or when the
/// deadline passes.
pub fn process_region(
    task: RegionTask,
    config: &PipelineConfig,
    deadline: Option<Instant>,
) -> Result<RegionOutput> {
    let RegionTask { region, mut reads } = task;
    for read in &reads {
        read.validate()?;
    }
    reads.sort_by_key(|r| r.start);

    let clusterer = UmiClusterer::new(config.cluster.clone());
    let builder = ConsensusBuilder::new(config.consensus.clone());
    let mut counts = CountAccumulator::new(&config.thresholds(), config.count_mode);

    let groups: Vec<Vec<&AlignedRead>> = reads
        .iter()
        .chunk_by(|r| r.start)
        .into_iter()
        .map(|(_, group)| group.collect())
        .collect();

    let mut records = Vec::new();
    let mut family_sizes = Vec::new();

    for group in &groups {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            let seconds = config.region_timeout.map_or(0, |t| t.as_secs());
            return Err(UmiecError::RegionTimeout { region: region.label(), seconds });
        }

        let umis: Vec<&str> = group.iter().map(|r| r.umi.as_str()).collect();
        let assignment = clusterer.assign(&umis)?;
        let mut members: Vec<Vec<&AlignedRead>> = vec![Vec::new(); assignment.clusters.len()];
        for (read, &cluster) in group.iter().zip(&assignment.cluster_of) {
            members[cluster].push(read);
        }

        for (cluster, family) in assignment.clusters.iter().zip(&members) {
            let consensus = builder.call(family, &cluster.representative);
            counts.add_family(family.len(), &consensus.tallies);
            family_sizes.push(family.len());
            if let Some(mut record) = consensus.record {
                record.region_id = region.id;
                if config.include_singletons || !record.is_singleton() {
                    records.push(record);
                }
            }
        }
    }
    records.sort_by_key(|r| r.start);

    debug!(
        "Region {}: {} reads, {} families, {} consensus reads written",
        region,
        reads.len(),
        family_sizes.len(),
        records.len()
    );
    Ok(RegionOutput { region, records, counts, family_sizes })
}
