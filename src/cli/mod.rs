use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

mod config;
mod masslynx;
mod ms;
mod uv;

use config::{Config, Settings};

/// rainbow - decode binary chromatography data to JSON
#[derive(Parser)]
#[command(name = "rainbow-decode")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML config file with decode and output defaults
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Pair width of a MassLynx `.DAT` file
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum WidthArg {
    /// 2-byte values
    #[value(name = "2")]
    Two,
    /// 6-byte pairs
    #[value(name = "6")]
    Six,
    /// 8-byte pairs
    #[value(name = "8")]
    Eight,
}

impl From<WidthArg> for rainbow::masslynx::PairWidth {
    fn from(arg: WidthArg) -> Self {
        match arg {
            WidthArg::Two => Self::Two,
            WidthArg::Six => Self::Six,
            WidthArg::Eight => Self::Eight,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a delta-coded UV trace
    Uv {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Byte offset of the first record (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_u32)]
        offset: u32,

        /// Number of records
        #[arg(long)]
        records: u32,

        /// Wavelength channels per record
        #[arg(long)]
        channels: u32,

        /// Index records first and decode them independently
        #[arg(long)]
        parallel: bool,

        /// Write the decoded arrays as JSON to this file
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Decode a peak-list mass spectrum into a dense matrix
    Ms {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Byte offset of the scan-block start word (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_u32)]
        offset: u32,

        /// Number of scans
        #[arg(long)]
        scans: u32,

        /// Decimal places m/z values are rounded to
        #[arg(short, long)]
        precision: Option<u32>,

        /// Write the decoded arrays as JSON to this file
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Decode a MassLynx _FUNCnnn.DAT file using its .IDX index
    Func {
        /// _FUNCnnn.DAT file
        #[arg(value_name = "DAT")]
        dat: PathBuf,

        /// Index file (defaults to the .DAT path with an .IDX extension)
        #[arg(long, value_name = "IDX")]
        idx: Option<PathBuf>,

        /// Function info file labelling 2-byte data (defaults to the sibling _FUNCTNS.INF)
        #[arg(long, value_name = "INF")]
        inf: Option<PathBuf>,

        /// Pair width (inferred from the index when omitted)
        #[arg(long, value_enum)]
        width: Option<WidthArg>,

        /// Decimal places keys are rounded to
        #[arg(short, long)]
        precision: Option<u32>,

        /// Mass calibration coefficients, comma separated, ascending power
        #[arg(long, value_name = "C0,C1,...")]
        calib: Option<String>,

        /// Write the decoded arrays as JSON to this file
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Decode a MassLynx _CHROnnn.DAT analog trace
    Analog {
        /// _CHROnnn.DAT file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Signal info file naming the trace (defaults to the sibling _CHROMS.INF)
        #[arg(long, value_name = "INF")]
        inf: Option<PathBuf>,

        /// Write the decoded arrays as JSON to this file
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Uv {
            file,
            offset,
            records,
            channels,
            parallel,
            output,
        } => {
            let settings = Settings::resolve(&config, None, parallel, cli.pretty);
            uv::run(&file, offset, records, channels, output.as_deref(), settings)
        }
        Commands::Ms {
            file,
            offset,
            scans,
            precision,
            output,
        } => {
            let settings = Settings::resolve(&config, precision, false, cli.pretty);
            ms::run(&file, offset, scans, output.as_deref(), settings)
        }
        Commands::Func {
            dat,
            idx,
            inf,
            width,
            precision,
            calib,
            output,
        } => {
            let settings = Settings::resolve(&config, precision, false, cli.pretty);
            let idx = idx.unwrap_or_else(|| dat.with_extension("IDX"));
            let inf = inf.unwrap_or_else(|| dat.with_file_name("_FUNCTNS.INF"));
            masslynx::run_func(
                &dat,
                &idx,
                &inf,
                width.map(Into::into),
                calib.as_deref(),
                output.as_deref(),
                settings,
            )
        }
        Commands::Analog { file, inf, output } => {
            let settings = Settings::resolve(&config, None, false, cli.pretty);
            let inf = inf.unwrap_or_else(|| file.with_file_name("_CHROMS.INF"));
            masslynx::run_analog(&file, &inf, output.as_deref(), settings)
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal offset
fn parse_u32(value: &str) -> std::result::Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{value}': {e}"))
}

/// Read a whole input file into memory
fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        anyhow::bail!("Input file does not exist: {}", path.display());
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    info!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Print `summary` to stdout and, if requested, write `full` to `output`
fn emit<S: Serialize, F: Serialize>(
    summary: &S,
    full: &F,
    output: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    if let Some(path) = output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        if pretty {
            serde_json::to_writer_pretty(&mut writer, full)?;
        } else {
            serde_json::to_writer(&mut writer, full)?;
        }
        writer.flush()?;
        info!("Wrote decoded arrays to {}", path.display());
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, summary)?;
    } else {
        serde_json::to_writer(&mut handle, summary)?;
    }
    writeln!(handle)?;
    Ok(())
}

/// `[first, last]` of a slice, if any
fn span<T: Copy>(values: &[T]) -> Option<[T; 2]> {
    Some([*values.first()?, *values.last()?])
}
