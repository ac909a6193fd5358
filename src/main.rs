//! CLI entrypoint for `credsift`.
//!
//! Loads one or more record files, prints a per-attribute summary, optionally
//! applies one filter, and writes the selected records as text or CSV files,
//! split into batches when requested, into an output directory.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use credsift::{
    batch::{BatchSize, Part, part_count, split_and_emit},
    export::{FormatKind, Naming},
    filter::Criterion,
    io::{DEFAULT_MMAP_THRESHOLD_BYTES, read_inputs},
    report::render_summary,
    session::{Session, SessionError},
};
use log::{LevelFilter, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "credsift",
    version,
    about = "Summarize, filter and export credential|attribute record dumps"
)]
struct Args {
    /// Path to the record file(s)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Keep only records matching KIND=VALUE (plan, country, phone, hold, payment)
    #[arg(short = 'f', long = "filter", value_parser = parse_criterion)]
    filter: Option<Criterion>,

    /// Export format
    #[arg(long = "format", value_enum, default_value_t = ExportFormat::Text)]
    format: ExportFormat,

    /// Records per output file ("all" or a count)
    #[arg(short = 'b', long = "batch-size", default_value = "all")]
    batch_size: BatchSize,

    /// Path to the output directory
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output file name prefix (defaults to the filter label)
    #[arg(long = "label")]
    label: Option<String>,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Parse lines in parallel
    #[arg(long = "parallel")]
    parallel: bool,

    /// Log counts of skipped/malformed lines encountered during parsing
    #[arg(long = "log-parse-stats")]
    log_parse_stats: bool,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress summary output (still writes exports if -o is provided)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Text,
    Csv,
}

impl From<ExportFormat> for FormatKind {
    fn from(f: ExportFormat) -> Self {
        match f {
            ExportFormat::Text => FormatKind::Text,
            ExportFormat::Csv => FormatKind::Csv,
        }
    }
}

fn parse_criterion(s: &str) -> Result<Criterion, credsift::filter::SelectorError> {
    Criterion::parse(s)
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    for p in &args.inputs {
        if !p.is_file() {
            bail!("input file not found: {}", p.display());
        }
    }
    if args.output.is_none() && (args.label.is_some() || args.batch_size != BatchSize::All) {
        warn!("--label/--batch-size have no effect without -o/--output");
    }
    Ok(())
}

fn load_session(args: &Args) -> Result<Session, SessionError> {
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };
    let blob = match read_inputs(&args.inputs, threshold) {
        Ok(b) => b,
        Err(e) => {
            error!("failed to load inputs: {:#}", e);
            std::process::exit(3);
        }
    };
    if args.parallel {
        Session::from_text_parallel(&String::from_utf8_lossy(&blob))
    } else {
        Session::from_bytes(&blob)
    }
}

/// Advance `naming` until the first file of the export is not already in
/// `outdir`, so a rerun in the same second never lands on an earlier file.
fn skip_taken_names(
    outdir: &Path,
    naming: &mut Naming,
    kind: FormatKind,
    batch_size: usize,
    records: usize,
) {
    let first_part = (part_count(records, batch_size) > 1).then_some(1);
    while outdir
        .join(naming.file_name(kind, batch_size, first_part))
        .exists()
    {
        naming.advance();
    }
}

/// Write one part; an existing file is never overwritten.
fn write_part(outdir: &Path, part: Part) -> Result<()> {
    let path = outdir.join(&part.payload.filename);
    let mut file = fs::File::options()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("create {}", path.display()))?;
    file.write_all(&part.payload.bytes)
        .with_context(|| format!("write {}", path.display()))?;
    info!(
        "wrote part {}/{} ({} records): {}",
        part.index,
        part.total,
        part.records,
        path.display()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    // Configure color policy
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    if let Err(e) = verify_inputs(&args) {
        error!("{}", e);
        std::process::exit(2);
    }

    let mut session = match load_session(&args) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(4);
        }
    };

    if args.log_parse_stats {
        let stats = session.parse_stats();
        info!(
            "parse stats: parsed={}, blank={}, malformed={}",
            stats.parsed, stats.blank, stats.malformed
        );
    }

    if !args.quiet {
        println!("{}", render_summary(session.summary()));
    }

    let kind = FormatKind::from(args.format);
    session.choose_format(kind);
    let batch_size = args.batch_size.as_usize();

    if let Some(criterion) = args.filter.clone() {
        let n = session.apply_filter(criterion.clone());
        if !args.quiet {
            println!(
                "{} {} record(s) with {}",
                "Found".bold().green(),
                n,
                criterion
            );
        }
        if n == 0 {
            warn!("no records match {}; nothing to export", criterion);
            return;
        }
    }

    if let Some(outdir) = args.output.as_deref() {
        if let Err(e) = fs::create_dir_all(outdir) {
            error!(
                "failed to create output directory {}: {}",
                outdir.display(),
                e
            );
            std::process::exit(5);
        }
        let (label, records) = match session.selection() {
            Some(selection) => (
                args.label.clone().unwrap_or_else(|| selection.label()),
                selection.records.len(),
            ),
            None => (
                args.label.clone().unwrap_or_else(|| "all".to_string()),
                session.records().len(),
            ),
        };
        let mut naming = Naming::new(&label);
        skip_taken_names(outdir, &mut naming, kind, batch_size, records);
        let sink = |part: Part| write_part(outdir, part);
        let res = if session.selection().is_some() {
            session.export_named::<anyhow::Error, _>(batch_size, &mut naming, sink)
        } else {
            split_and_emit::<anyhow::Error, _>(
                session.records(),
                kind,
                batch_size,
                &mut naming,
                sink,
            )
        };
        match res {
            Ok(parts) => info!("export complete: {} file(s) in {}", parts, outdir.display()),
            Err(e) => {
                error!("export failed: {:#}", e);
                std::process::exit(6);
            }
        }
    }
}
