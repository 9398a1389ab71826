//! Parallel dispatch of region tasks and in-order merging of their results.
//!
//! Each region is one task on a fixed-size `rayon` pool. Workers send their outcome over a
//! `crossbeam-channel` tagged with the region index; the merging thread buffers outcomes in
//! a [`ReorderBuffer`] and hands successful outputs to the caller strictly in region order.
//! A failing or panicking region is recorded as a [`RegionFailure`] and never affects the
//! output of other regions.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use crossbeam_channel::unbounded;
use log::{debug, warn};

use crate::config::PipelineConfig;
use crate::errors::UmiecError;
use crate::region::{GenomicRegion, Partition, RegionTask};
use crate::reorder_buffer::ReorderBuffer;
use crate::worker::{RegionOutput, process_region};

/// A shared flag that stops regions from starting once set.
///
/// Regions already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A region that produced no output, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    pub region: GenomicRegion,
    pub reason: String,
}

/// Totals of one scheduled run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub total_regions: usize,
    pub succeeded: usize,
    /// Failed regions in region order
    pub failures: Vec<RegionFailure>,
    pub off_target_reads: u64,
    /// Families of two or more reads
    pub consensus_reads: u64,
    /// Families of one read
    pub singletons: u64,
}

impl RunReport {
    /// Share of regions that failed; zero for a run without regions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failed_fraction(&self) -> f64 {
        if self.total_regions == 0 {
            0.0
        } else {
            self.failures.len() as f64 / self.total_regions as f64
        }
    }

    /// Returns true if the share of failed regions does not exceed `max_failed_fraction`.
    #[must_use]
    pub fn within_tolerance(&self, max_failed_fraction: f64) -> bool {
        self.failed_fraction() <= max_failed_fraction
    }
}

type Outcome = std::result::Result<RegionOutput, RegionFailure>;

/// Runs region tasks on a worker pool and merges the outputs in region order.
pub struct RegionScheduler {
    config: Arc<PipelineConfig>,
    cancel: CancellationToken,
}

impl RegionScheduler {
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config, cancel: CancellationToken::new() }
    }

    /// Uses `cancel` instead of a private token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels the regions of this scheduler that have not started yet.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Processes every task of `partition` and passes each successful [`RegionOutput`] to
    /// `sink`, in region order.
    ///
    /// Region failures are collected in the returned report; applying the failure
    /// tolerance is up to the caller.
    ///
    /// # Errors
    /// Fails if the worker pool cannot be built or `sink` fails.
    pub fn run<F>(&self, partition: Partition, sink: F) -> Result<RunReport>
    where
        F: FnMut(RegionOutput) -> Result<()>,
    {
        let config = Arc::clone(&self.config);
        self.dispatch(partition, move |task, deadline| process_region(task, &config, deadline), sink)
    }

    fn dispatch<P, F>(&self, partition: Partition, process: P, mut sink: F) -> Result<RunReport>
    where
        P: Fn(RegionTask, Option<Instant>) -> crate::errors::Result<RegionOutput>
            + Send
            + Sync
            + 'static,
        F: FnMut(RegionOutput) -> Result<()>,
    {
        let Partition { tasks, off_target_reads } = partition;
        let mut report =
            RunReport { total_regions: tasks.len(), off_target_reads, ..RunReport::default() };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("umiec-region-{i}"))
            .build()
            .context("Failed to build region worker pool")?;
        debug!("Dispatching {} regions on {} threads", tasks.len(), self.config.threads);

        let process = Arc::new(process);
        let (tx, rx) = unbounded::<(u64, Outcome)>();
        for (seq, task) in (0u64..).zip(tasks) {
            let tx = tx.clone();
            let process = Arc::clone(&process);
            let cancel = self.cancel.clone();
            let timeout = self.config.region_timeout;
            pool.spawn(move || {
                let outcome = run_task(task, process.as_ref(), &cancel, timeout);
                // The receiver is only gone if the merge loop already bailed.
                let _ = tx.send((seq, outcome));
            });
        }
        drop(tx);

        let mut buffer = ReorderBuffer::new();
        for (seq, outcome) in &rx {
            if buffer.insert(seq, outcome).is_some() {
                bail!("Region {seq} reported more than once");
            }
            for outcome in buffer.drain_ready() {
                match outcome {
                    Ok(output) => {
                        report.succeeded += 1;
                        let hist = output.hist_row();
                        report.consensus_reads += hist.consensus;
                        report.singletons += hist.singletons;
                        sink(output)?;
                    }
                    Err(failure) => {
                        warn!("Region {} failed: {}", failure.region, failure.reason);
                        report.failures.push(failure);
                    }
                }
            }
        }

        if !buffer.is_empty() || report.succeeded + report.failures.len() != report.total_regions
        {
            bail!(
                "Only {} of {} regions reported a result",
                report.succeeded + report.failures.len(),
                report.total_regions
            );
        }
        Ok(report)
    }
}

/// Runs one task, turning errors and panics into a [`RegionFailure`].
fn run_task<P>(
    task: RegionTask,
    process: &P,
    cancel: &CancellationToken,
    timeout: Option<std::time::Duration>,
) -> Outcome
where
    P: Fn(RegionTask, Option<Instant>) -> crate::errors::Result<RegionOutput>,
{
    let region = task.region.clone();
    if cancel.is_cancelled() {
        let reason = UmiecError::Cancelled { region: region.label() }.to_string();
        return Err(RegionFailure { region, reason });
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    match catch_unwind(AssertUnwindSafe(|| process(task, deadline))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(RegionFailure { region, reason: e.to_string() }),
        Err(panic_info) => {
            let reason = format!("worker panicked: {}", panic_message(panic_info.as_ref()));
            Err(RegionFailure { region, reason })
        }
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
