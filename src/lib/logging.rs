//! Formatting helpers for log output and run summaries.

use std::time::{Duration, Instant};

use log::{info, warn};

pub use umiec_metrics::format_count;

use crate::scheduler::RunReport;

/// Formats a fraction as a percentage.
///
/// # Examples
///
/// ```
/// use umiec_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0)
}

/// Formats a duration as `45s`, `2m 15s` or `1h 30m`.
///
/// # Examples
///
/// ```
/// use umiec_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => match secs % 60 {
            0 => format!("{}m", secs / 60),
            s => format!("{}m {s}s", secs / 60),
        },
        _ => match (secs % 3600) / 60 {
            0 => format!("{}h", secs / 3600),
            m => format!("{}h {m}m", secs / 3600),
        },
    }
}

/// Formats a throughput, e.g. `1,000 reads/s`.
#[must_use]
pub fn format_rate(count: u64, duration: Duration, unit: &str) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} {unit}/s", format_count(count));
    }
    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} {unit}/s", format_count(rate as u64))
    } else {
        format!("{:.1} {unit}/min", rate * 60.0)
    }
}

/// Times an operation and logs its start and completion.
///
/// ```no_run
/// use umiec_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Building consensus reads");
/// timer.log_completion(10_000, "reads");
/// ```
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    /// Starts the timer and logs the operation name.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        info!("{operation} ...");
        Self { operation: operation.to_string(), start: Instant::now() }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Logs completion with the number of items handled.
    pub fn log_completion(&self, count: u64, unit: &str) {
        let elapsed = self.elapsed();
        info!(
            "{} completed: {} {unit} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(elapsed),
            format_rate(count, elapsed, unit)
        );
    }
}

/// Logs the outcome of a region run, naming every failed region.
pub fn log_run_summary(report: &RunReport) {
    info!("Region summary:");
    info!("  Regions: {}", format_count(report.total_regions as u64));
    info!("  Succeeded: {}", format_count(report.succeeded as u64));
    info!("  Consensus reads: {}", format_count(report.consensus_reads));
    info!("  Singletons: {}", format_count(report.singletons));
    if report.off_target_reads > 0 {
        info!("  Off-target reads: {}", format_count(report.off_target_reads));
    }
    if !report.failures.is_empty() {
        warn!(
            "  Failed: {} ({} of regions)",
            format_count(report.failures.len() as u64),
            format_percent(report.failed_fraction(), 2)
        );
        for failure in &report.failures {
            warn!("    {}: {}", failure.region.label(), failure.reason);
        }
    }
}
