//! WSIM CLI - WSI NOWrad mosaic decoder
//!
//! A command-line tool for decoding WSI NOWrad files onto a regular grid and
//! writing the grids as raw bytes with a JSON description.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wsim::{read_input, GridSink, Params, RawGridSink, WsiFile};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Verbosity {
    /// Only log warnings and failures.
    #[default]
    Quiet,
    /// Log header information and per-file progress.
    Normal,
    /// Log all decoding details including runs.
    Verbose,
}

impl Verbosity {
    /// Returns the tracing filter string for this verbosity level.
    fn as_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "wsim=warn",
            Verbosity::Normal => "wsim=info",
            Verbosity::Verbose => "wsim=trace",
        }
    }
}

/// WSI NOWrad decoder
#[derive(Parser, Debug)]
#[command(name = "wsim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON parameter file
    #[arg(short, long)]
    params: PathBuf,

    /// Directory for the output grids
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Verbosity level
    #[arg(short, long, value_enum, default_value_t = Verbosity::default())]
    verbosity: Verbosity,

    /// Print each file's header to stderr
    #[arg(long)]
    dump_header: bool,

    /// Input WSI files, plain or gzip compressed, in archive order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing with the appropriate filter level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.verbosity.as_filter())),
        )
        .with_target(false)
        .with_level(true)
        .init();

    match run(&args) {
        Ok(0) => {
            error!("No files decoded");
            ExitCode::FAILURE
        }
        Ok(decoded) => {
            println!(
                "Decoded {} of {} files into {}",
                decoded,
                args.inputs.len(),
                args.output_dir.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Setup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Decodes every input, skipping files that fail. Returns the number of
/// files written.
fn run(args: &Args) -> Result<usize, Box<dyn std::error::Error>> {
    info!("Loading parameters: {}", args.params.display());
    let params = Params::from_file(&args.params)?;
    let mut wsi = WsiFile::new(params.color_table()?, params.output_spec());
    let mut sink = RawGridSink::new(&args.output_dir);

    let mut decoded = 0;
    for input in &args.inputs {
        info!("Processing file: {}", input.display());

        let result = read_input(input).and_then(|bytes| {
            let grid = wsi.read(&bytes);
            if args.dump_header {
                eprint!("{}", wsi.header_debug_string());
            }
            sink.write(&grid?)
        });

        match result {
            Ok(_) => decoded += 1,
            Err(e) => error!("Skipping {}: {}", input.display(), e),
        }
    }

    Ok(decoded)
}
