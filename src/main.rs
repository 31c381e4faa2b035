use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use bam2rpkm::genomics::{load_annotation, write_report};
use bam2rpkm::{EmptyLibraryPolicy, ExpressionProfiler, ProfilerConfig, ReadFilter};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bam2rpkm",
    version,
    about = "Per-gene RPKM from a GFF3 annotation and a sorted, indexed BAM"
)]
struct Cli {
    /// Genome annotation (GFF3).
    annotation: PathBuf,
    /// Coordinate-sorted BAM or CRAM with an index alongside.
    alignments: PathBuf,
    /// Read length in bases, uniform across reads.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    read_length: u32,
    /// Worker threads for region aggregation (0 = one per CPU).
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Skip reads with any of these SAM flag bits (decimal or 0x-prefixed hex).
    #[arg(long, default_value_t = ReadFilter::DEFAULT_EXCLUDE, value_parser = parse_flags)]
    exclude_flags: u16,
    /// Skip reads below this mapping quality.
    #[arg(long, default_value_t = 0)]
    min_mapq: u8,
    /// What to do when no read maps to a coding region.
    #[arg(long, value_enum, default_value_t = EmptyLibrary::Fail)]
    on_empty_library: EmptyLibrary,
    /// Only log warnings and errors.
    #[arg(long, short)]
    quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum EmptyLibrary {
    /// Exit with an error.
    Fail,
    /// Report nan/inf values.
    Nan,
}

impl From<EmptyLibrary> for EmptyLibraryPolicy {
    fn from(value: EmptyLibrary) -> Self {
        match value {
            EmptyLibrary::Fail => EmptyLibraryPolicy::Fail,
            EmptyLibrary::Nan => EmptyLibraryPolicy::ReportNonFinite,
        }
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors exit 1 rather than clap's 2.
        Err(err) if err.use_stderr() => {
            err.print().context("failed to print usage error")?;
            process::exit(1);
        }
        Err(err) => err.exit(),
    };

    init_tracing(cli.quiet);
    run(cli)
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let annotation = load_annotation(&cli.annotation).with_context(|| {
        format!(
            "an error occurred reading the GFF file '{}'",
            cli.annotation.display()
        )
    })?;
    info!(
        "found {} gene features in GFF file '{}'",
        annotation.len(),
        cli.annotation.display()
    );
    if !annotation.malformed.is_empty() {
        warn!(
            "skipped {} malformed lines in '{}'",
            annotation.malformed.len(),
            cli.annotation.display()
        );
    }

    let filter = ReadFilter {
        exclude_flags: cli.exclude_flags,
        min_mapq: cli.min_mapq,
    };
    let config = ProfilerConfig::new(cli.read_length)?
        .with_threads(cli.threads)
        .with_filter(filter)
        .with_empty_library(cli.on_empty_library.into());
    let profiler = ExpressionProfiler::new(config);

    let mut regions = annotation.regions;
    let report = profiler
        .profile_bam(&mut regions, &cli.alignments)
        .with_context(|| {
            format!(
                "an error occurred profiling the BAM file '{}'",
                cli.alignments.display()
            )
        })?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_report(&mut out, &report.expressions).context("failed to write report")?;
    Ok(())
}

fn parse_flags(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid flag mask '{value}': {err}"))
}
