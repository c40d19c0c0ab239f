use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use rainbow::ms::decode_peak_list;

use super::config::Settings;
use super::{emit, read_input, span};

#[derive(Serialize)]
struct MsSummary<'a> {
    file: String,
    scans: usize,
    mz_values: usize,
    time_range: Option<[f64; 2]>,
    mz_range: Option<[f64; 2]>,
    total_ion_current: f64,
    output: Option<&'a Path>,
}

/// Decode a peak-list spectrum into dense arrays
pub fn run(
    file: &Path,
    offset: u32,
    scans: u32,
    output: Option<&Path>,
    settings: Settings,
) -> Result<()> {
    let bytes = read_input(file)?;

    let spectra = decode_peak_list(&bytes, offset, scans, settings.precision)
        .with_context(|| format!("Failed to decode peak list in {}", file.display()))?;

    let summary = MsSummary {
        file: file.display().to_string(),
        scans: spectra.num_scans(),
        mz_values: spectra.mzs.len(),
        time_range: span(&spectra.times),
        mz_range: span(&spectra.mzs),
        total_ion_current: spectra.intensities.as_slice().iter().sum(),
        output,
    };

    emit(&summary, &spectra, output, settings.pretty)
}
