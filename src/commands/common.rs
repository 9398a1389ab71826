//! Common CLI options shared across commands.
//!
//! Argument groups here are composed into command structs with `#[command(flatten)]`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use noodles::sam::Header;

use umiec_lib::bam_io::{UMI_TAG, UmiSource, with_program_record};
use umiec_lib::validation::{validate_file_exists, validate_positive, validate_tag};

use crate::version::VERSION;

/// Input and output BAM paths.
#[derive(Debug, Clone, Args)]
pub struct BamIoOptions {
    /// Input BAM file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output BAM file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl BamIoOptions {
    /// Validates that the input file exists.
    pub fn validate(&self) -> Result<()> {
        validate_file_exists(&self.input, "Input BAM")?;
        Ok(())
    }
}

/// Where to find each read's UMI.
#[derive(Debug, Clone, Args)]
pub struct UmiOptions {
    /// SAM tag holding the UMI
    #[arg(short = 't', long = "umi-tag", default_value = "RX")]
    pub umi_tag: String,

    /// Take the UMI from the end of the read name instead of a tag
    #[arg(long = "umi-from-name", default_value_t = false)]
    pub umi_from_name: bool,

    /// Delimiter preceding the UMI in the read name
    #[arg(long = "umi-delimiter", default_value_t = '_')]
    pub umi_delimiter: char,
}

impl Default for UmiOptions {
    fn default() -> Self {
        Self { umi_tag: "RX".to_string(), umi_from_name: false, umi_delimiter: '_' }
    }
}

impl UmiOptions {
    /// Resolves the options into a [`UmiSource`].
    pub fn source(&self) -> Result<UmiSource> {
        if self.umi_from_name {
            Ok(UmiSource::ReadName(self.umi_delimiter))
        } else {
            Ok(UmiSource::Tag(validate_tag(&self.umi_tag, "umi-tag")?))
        }
    }

    /// The tag consensus reads carry their UMI in.
    pub fn output_tag(&self) -> Result<noodles::sam::alignment::record::data::field::Tag> {
        match self.source()? {
            UmiSource::Tag(tag) => Ok(tag),
            UmiSource::ReadName(_) => Ok(UMI_TAG),
        }
    }
}

/// Worker thread count.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of regions processed in parallel
    #[arg(short = '@', long = "threads", default_value_t = 1)]
    pub threads: usize,
}

impl Default for ThreadingOptions {
    fn default() -> Self {
        Self { threads: 1 }
    }
}

impl ThreadingOptions {
    /// Validates that at least one thread is requested.
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.threads, "threads")?;
        Ok(())
    }
}

/// Adds an @PG record for this invocation.
pub fn add_pg_record(header: &Header, command_line: &str) -> Result<Header> {
    with_program_record(header, VERSION, command_line)
}
