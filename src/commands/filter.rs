//! Filter a consensus BAM by family size.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use noodles::sam::alignment::RecordBuf;

use umiec_lib::bam_io::{create_bam_reader, create_bam_writer, finish_bam_writer, write_records};
use umiec_lib::consensus::family_size_from_name;
use umiec_lib::logging::{OperationTimer, format_count};
use umiec_lib::progress::ProgressTracker;
use umiec_lib::validation::validate_positive;

use crate::commands::command::Command;
use crate::commands::common::{BamIoOptions, add_pg_record};

/// Keep consensus reads whose family has at least a minimum number of reads.
#[derive(Debug, Parser)]
#[command(
    name = "filter",
    about = "\x1b[38;5;173m[POST-CONSENSUS]\x1b[0m \x1b[36mKeep consensus reads from large families\x1b[0m",
    long_about = r#"
Keep consensus reads whose family has at least a minimum number of reads.

The family size is read from the end of the read name (`..._Count=N`), as written by
`umiec consensus`. Records without a family size in their name are dropped.

Example usage:
  umiec filter -i sample_consensus_reads.bam -o sample_consensus_reads.min3.bam -m 3
"#
)]
pub struct Filter {
    #[command(flatten)]
    pub io: BamIoOptions,

    /// Minimum family size to keep
    #[arg(short = 'm', long = "min-family-size", default_value_t = 3)]
    pub min_family_size: usize,
}

/// Returns true if the record's name carries a family size of at least `min_family_size`.
fn passes(record: &RecordBuf, min_family_size: usize) -> bool {
    record
        .name()
        .and_then(|name| std::str::from_utf8(name.as_ref()).ok())
        .and_then(family_size_from_name)
        .is_some_and(|size| size >= min_family_size)
}

impl Command for Filter {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        validate_positive(self.min_family_size, "min-family-size")?;
        let timer = OperationTimer::new("Filtering consensus reads");

        info!("Starting Filter");
        info!("Input: {}", self.io.input.display());
        info!("Output: {}", self.io.output.display());
        info!("Minimum family size: {}", self.min_family_size);

        let (mut reader, header) = create_bam_reader(&self.io.input)?;
        let header = add_pg_record(&header, command_line)?;
        let mut writer = create_bam_writer(&self.io.output, &header)?;

        let progress = ProgressTracker::new("Processed records");
        let mut total = 0u64;
        let mut kept = 0u64;
        for result in reader.record_bufs(&header) {
            let record = result.context("Failed to read BAM record")?;
            total += 1;
            progress.add(1);
            if passes(&record, self.min_family_size) {
                kept += write_records(&mut writer, &header, std::iter::once(&record))?;
            }
        }
        progress.finish();
        finish_bam_writer(writer)?;

        info!(
            "Kept {} of {} records ({} from smaller families)",
            format_count(kept),
            format_count(total),
            format_count(total - kept)
        );
        timer.log_completion(total, "records");
        Ok(())
    }
}
