use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::path::Path;

use rainbow::masslynx::{
    decode_analog_trace, decode_func, parse_chrom_info, parse_func_index, parse_func_info,
    AnalogInfo, AnalogTrace, Calibration, Detector, FuncData, FuncInfo, PairWidth,
};

use super::config::Settings;
use super::{emit, read_input, span};

#[derive(Serialize)]
struct FuncSummary<'a> {
    file: String,
    width: usize,
    scans: usize,
    keys: usize,
    key_range: Option<[f64; 2]>,
    calibrated: bool,
    output: Option<&'a Path>,
}

#[derive(Serialize)]
struct FuncOutput<'a> {
    times: &'a [f32],
    data: &'a FuncData,
}

#[derive(Serialize)]
struct AnalogSummary<'a> {
    file: String,
    signal: Option<&'a str>,
    unit: Option<&'a str>,
    detector: Option<Detector>,
    samples: usize,
    time_range: Option<[f32; 2]>,
    output: Option<&'a Path>,
}

#[derive(Serialize)]
struct AnalogOutput<'a> {
    signal: Option<&'a AnalogInfo>,
    detector: Option<Detector>,
    #[serde(flatten)]
    trace: &'a AnalogTrace,
}

/// Decode a `_FUNCnnn.DAT` file with its index
pub fn run_func(
    dat: &Path,
    idx: &Path,
    inf: &Path,
    width: Option<PairWidth>,
    calib: Option<&str>,
    output: Option<&Path>,
    settings: Settings,
) -> Result<()> {
    let index_bytes = read_input(idx)?;
    let index = parse_func_index(&index_bytes)
        .with_context(|| format!("Failed to parse index {}", idx.display()))?;
    let data = read_input(dat)?;

    let width = match width {
        Some(width) => width,
        None => index
            .pair_width(data.len())
            .context("Failed to infer pair width; pass --width")?,
    };
    info!(
        "{} scans, {} pairs of {} bytes",
        index.num_scans(),
        index.total_pairs(),
        width.bytes()
    );

    // Only 2-byte data takes its labels from the function info file.
    let function_info = match width {
        PairWidth::Two => Some(load_func_info(dat, inf)?),
        _ => None,
    };

    let calibration = calib
        .map(str::parse::<Calibration>)
        .transpose()
        .context("Invalid --calib coefficients")?;

    let decoded = decode_func(
        &data,
        &index,
        width,
        settings.precision,
        calibration.as_ref(),
        function_info.as_ref(),
    )
    .with_context(|| format!("Failed to decode {}", dat.display()))?;

    let (scans, keys) = decoded.shape();
    let summary = FuncSummary {
        file: dat.display().to_string(),
        width: width.bytes(),
        scans,
        keys,
        key_range: span(decoded.keys()),
        calibrated: calibration.is_some(),
        output,
    };
    let full = FuncOutput {
        times: &index.times,
        data: &decoded,
    };

    emit(&summary, &full, output, settings.pretty)
}

/// Pick the `_FUNCTNS.INF` record of the function `dat` belongs to
fn load_func_info(dat: &Path, inf: &Path) -> Result<FuncInfo> {
    let bytes = read_input(inf).context("2-byte data needs _FUNCTNS.INF; pass --inf")?;
    let records = parse_func_info(&bytes)
        .with_context(|| format!("Failed to parse function info {}", inf.display()))?;

    let record = match file_number(dat, "_FUNC") {
        Some(number) => number.checked_sub(1).and_then(|i| records.get(i)),
        None => records.last(),
    };
    record.cloned().with_context(|| {
        format!(
            "{} holds no record for {}",
            inf.display(),
            dat.display()
        )
    })
}

/// Decode a `_CHROnnn.DAT` analog trace
pub fn run_analog(
    file: &Path,
    inf: &Path,
    output: Option<&Path>,
    settings: Settings,
) -> Result<()> {
    let bytes = read_input(file)?;
    let trace = decode_analog_trace(&bytes)
        .with_context(|| format!("Failed to decode analog trace {}", file.display()))?;

    let signal = if inf.exists() {
        let info_bytes = read_input(inf)?;
        let signals = parse_chrom_info(&info_bytes)
            .with_context(|| format!("Failed to parse signal info {}", inf.display()))?;
        let signal = file_number(file, "_CHRO")
            .and_then(|number| number.checked_sub(1))
            .and_then(|i| signals.get(i).cloned());
        if signal.is_none() {
            warn!("{} names no signal for {}", inf.display(), file.display());
        }
        signal
    } else {
        warn!("No signal info at {}; trace is unnamed", inf.display());
        None
    };
    let detector = signal.as_ref().and_then(AnalogInfo::detector);

    let summary = AnalogSummary {
        file: file.display().to_string(),
        signal: signal.as_ref().map(|s| s.name.as_str()),
        unit: signal.as_ref().and_then(|s| s.unit.as_deref()),
        detector,
        samples: trace.times.len(),
        time_range: span(&trace.times),
        output,
    };
    let full = AnalogOutput {
        signal: signal.as_ref(),
        detector,
        trace: &trace,
    };

    emit(&summary, &full, output, settings.pretty)
}

/// The `nnn` of a `<prefix>nnn.DAT` file name
fn file_number(path: &Path, prefix: &str) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(prefix)?
        .parse()
        .ok()
}
