//! Merging of per-region allele counts into the run's count table.
//!
//! A read is assigned to the region its alignment starts in, but its bases may extend into
//! the next region. Workers therefore report counts for every position their reads cover,
//! and the [`CountTable`] merges counts for the same position across regions before it
//! turns them into rows. Only positions inside a target region produce rows.
//!
//! Outputs must be fed in region order. Every read of a later region starts at or after
//! that region's start, so positions left of the incoming region's start are final.

use std::sync::Arc;

use umiec_consensus::{Allele, CountAccumulator, PositionCounts};
use umiec_metrics::CountRow;

use crate::config::PipelineConfig;
use crate::reference::ReferenceGenome;
use crate::region::GenomicRegion;

/// Builds count rows from region counts fed in genomic order.
pub struct CountTable {
    /// Target regions sorted by contig and start
    regions: Vec<GenomicRegion>,
    config: Arc<PipelineConfig>,
    reference: Option<Arc<ReferenceGenome>>,
    /// Counts of the contig currently being merged
    pending: Option<(usize, CountAccumulator)>,
}

impl CountTable {
    #[must_use]
    pub fn new(
        regions: Vec<GenomicRegion>,
        config: Arc<PipelineConfig>,
        reference: Option<Arc<ReferenceGenome>>,
    ) -> Self {
        let mut regions = regions;
        regions.sort_by_key(|r| (r.contig_id, r.start));
        Self { regions, config, reference, pending: None }
    }

    /// Merges the counts of `region` and returns the rows that became final.
    ///
    /// Regions must arrive in genomic order; failed regions may be skipped.
    pub fn add(&mut self, region: &GenomicRegion, counts: CountAccumulator) -> Vec<CountRow> {
        let same_contig = self.pending.as_mut().filter(|(id, _)| *id == region.contig_id);
        if let Some((contig_id, pending)) = same_contig {
            let contig_id = *contig_id;
            let done = pending.drain_before(region.start);
            pending.merge(counts);
            return self.build(contig_id, done);
        }
        let rows = self.finish();
        self.pending = Some((region.contig_id, counts));
        rows
    }

    /// Returns the rows of all remaining positions.
    pub fn finish(&mut self) -> Vec<CountRow> {
        match self.pending.take() {
            Some((contig_id, mut pending)) => self.build(contig_id, pending.finish()),
            None => Vec::new(),
        }
    }

    /// The target region containing `pos`, if any.
    fn region_at(&self, contig_id: usize, pos: usize) -> Option<&GenomicRegion> {
        let idx = self.regions.partition_point(|r| (r.contig_id, r.start) <= (contig_id, pos));
        idx.checked_sub(1).map(|i| &self.regions[i]).filter(|r| r.contains(contig_id, pos))
    }

    /// One row per threshold with coverage, for positions inside a target region.
    fn build(&self, contig_id: usize, positions: Vec<PositionCounts>) -> Vec<CountRow> {
        let thresholds = self.config.thresholds();
        let mut rows = Vec::new();
        for PositionCounts { ref_pos, by_threshold } in positions {
            let Some(region) = self.region_at(contig_id, ref_pos) else {
                continue;
            };
            let reference = self
                .reference
                .as_deref()
                .and_then(|r| r.base_at(&region.contig, ref_pos))
                .or_else(|| by_threshold.first().and_then(|c| c.majority_base()))
                .unwrap_or(b'N');

            for (&family_size, counts) in thresholds.iter().zip(&by_threshold) {
                if counts.is_empty() {
                    continue;
                }
                let (allele, max_count, frequency) = counts.max_non_ref(reference);
                rows.push(CountRow {
                    sample: self.config.sample_name.clone(),
                    contig: region.contig.clone(),
                    position: ref_pos + 1,
                    name: region.name_or_empty().to_string(),
                    reference: char::from(reference),
                    a: counts.get(Allele::A),
                    c: counts.get(Allele::C),
                    g: counts.get(Allele::G),
                    t: counts.get(Allele::T),
                    i: counts.get(Allele::Insertion),
                    d: counts.get(Allele::Deletion),
                    n: counts.get(Allele::N),
                    coverage: counts.coverage(),
                    family_size,
                    max_non_ref_count: max_count,
                    max_non_ref_frequency: frequency,
                    max_non_ref_allele: allele.symbol(),
                });
            }
        }
        rows
    }
}
