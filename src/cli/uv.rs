use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::path::Path;

use rainbow::uv::{decode_delta_trace, decode_delta_trace_indexed, DeltaTrace};

use super::config::Settings;
use super::{emit, read_input, span};

#[derive(Serialize)]
struct UvSummary<'a> {
    file: String,
    records: usize,
    channels: usize,
    time_range: Option<[u32; 2]>,
    max_intensity: Option<i64>,
    output: Option<&'a Path>,
}

/// Decode a delta-coded UV trace
pub fn run(
    file: &Path,
    offset: u32,
    records: u32,
    channels: u32,
    output: Option<&Path>,
    settings: Settings,
) -> Result<()> {
    let bytes = read_input(file)?;

    let trace = if settings.parallel {
        info!("Decoding {records} records via record index");
        decode_delta_trace_indexed(&bytes, offset, records, channels)
    } else {
        decode_delta_trace(&bytes, offset, records, channels)
    }
    .with_context(|| format!("Failed to decode UV trace in {}", file.display()))?;

    emit(&summarize(file, &trace, output), &trace, output, settings.pretty)
}

fn summarize<'a>(file: &Path, trace: &DeltaTrace, output: Option<&'a Path>) -> UvSummary<'a> {
    UvSummary {
        file: file.display().to_string(),
        records: trace.num_records(),
        channels: trace.num_channels(),
        time_range: span(&trace.times),
        max_intensity: trace.intensities.as_slice().iter().copied().max(),
        output,
    }
}
