//! # rainbow-decode
//!
//! Command-line front end for the rainbow decoders. Each subcommand reads a
//! binary file, decodes one data region, prints a JSON summary and, with
//! `--output`, writes the full decoded arrays as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Delta-coded UV trace
//! rainbow-decode uv DAD1.UV --offset 0x1000 --records 1200 --channels 201
//!
//! # Peak-list mass spectrum, m/z rounded to one decimal
//! rainbow-decode ms MSD1.MS --offset 0x10A --scans 3000 -p 1 -o msd1.json
//!
//! # MassLynx function data with its index
//! rainbow-decode func _FUNC001.DAT --calib "1.0e-3,0.9998"
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    cli::init_logging(cli.verbosity());

    cli::dispatch(cli)
}
