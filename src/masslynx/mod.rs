//! # Waters MassLynx function and analog data
//!
//! A MassLynx `.raw` directory stores each acquisition function as a pair
//! of files: `_FUNCnnn.IDX`, a table of 22-byte scan entries, and
//! `_FUNCnnn.DAT`, the packed key/value pairs those entries point into.
//! Keys are m/z (or wavelength) values and values are intensities. The pair
//! width (2, 6 or 8 bytes) is inferred from the index and the data size.
//! 2-byte data carries values only; its channel labels are the `q1` masses
//! of the function's record in `_FUNCTNS.INF`. Analog detector traces live
//! in `_CHROnnn.DAT` files, named and labelled by `_CHROMS.INF`.
//!
//! Opening the directory and reading the files is left to the caller; these
//! functions only see byte buffers.
//!
//! ```
//! use rainbow::masslynx::{decode_func, parse_func_index, FuncData};
//!
//! // one scan holding one 6-byte pair: key 100.0, value 25
//! let raw: u64 = (100 << 25) | (23 << 20) | 25;
//! let mut dat = (raw as u32).to_le_bytes().to_vec();
//! dat.extend_from_slice(&((raw >> 32) as u16).to_le_bytes());
//!
//! let mut idx = Vec::new();
//! idx.extend_from_slice(&0u32.to_le_bytes()); // offset
//! idx.extend_from_slice(&1u32.to_le_bytes()); // pair count
//! idx.extend_from_slice(&0u32.to_le_bytes()); // TIC
//! idx.extend_from_slice(&0.5f32.to_le_bytes()); // minutes
//! idx.extend_from_slice(&[0; 6]);
//!
//! let index = parse_func_index(&idx)?;
//! let width = index.pair_width(dat.len())?;
//! match decode_func(&dat, &index, width, 0, None, None)? {
//!     FuncData::Integer(spectra) => {
//!         assert_eq!(spectra.keys, vec![100.0]);
//!         assert_eq!(spectra.intensities.row(0), &[25]);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! # Ok::<(), rainbow::DecodeError>(())
//! ```

use std::str::FromStr;

use byteorder::LittleEndian;
use log::debug;
use serde::Serialize;

use crate::cursor::ByteCursor;
use crate::densify::{densify, SparseScans};
use crate::error::{checked_extent, try_alloc, DecodeError, Result};
use crate::matrix::IntensityMatrix;
use crate::ms::MAX_PRECISION;


/// Bytes per `.IDX` scan entry
pub const INDEX_ENTRY_LEN: usize = 22;
/// Header bytes before the samples of an analog `_CHROnnn.DAT` file
pub const ANALOG_HEADER_LEN: usize = 0x80;

/// Bytes per `_FUNCTNS.INF` function record
pub const FUNC_INFO_RECORD_LEN: usize = 424;
/// Offset of the first signal record in `_CHROMS.INF`
pub const CHROM_INFO_START: usize = 0x84;
/// Bytes per `_CHROMS.INF` signal record
pub const CHROM_INFO_RECORD_LEN: usize = 0x55;

const PAIR_COUNT_MASK: u32 = 0x3F_FFFF;
const CALIBRATED_FLAG: u32 = 0x4000_0000;
const FUNC_LABEL_COUNT: usize = 32;

/// Parsed `_FUNCnnn.IDX` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncIndex {
    /// Byte offset of each scan's first pair within the `.DAT` file
    pub offsets: Vec<u32>,
    /// Number of pairs in each scan
    pub counts: Vec<usize>,
    /// Scan times in minutes
    pub times: Vec<f32>,
}

impl FuncIndex {
    /// Number of scans
    pub fn num_scans(&self) -> usize {
        self.counts.len()
    }

    /// Pairs across all scans
    pub fn total_pairs(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Infer the pair width from the last scan that holds any pairs.
    pub fn pair_width(&self, dat_len: usize) -> Result<PairWidth> {
        let (offset, count) = self
            .offsets
            .iter()
            .zip(&self.counts)
            .rev()
            .find(|&(_, &count)| count > 0)
            .ok_or_else(|| DecodeError::InvalidArgument("no scan holds any pairs".into()))?;

        let tail = dat_len.checked_sub(*offset as usize).ok_or(DecodeError::OutOfBounds {
            offset: *offset as usize,
            width: 0,
            len: dat_len,
        })?;
        PairWidth::from_bytes(tail / *count)
    }
}

/// Parse a `_FUNCnnn.IDX` buffer.
///
/// Each 22-byte entry holds a little-endian offset, a packed info word
/// (low 22 bits: pair count, bit 30: calibrated flag), the TIC, the scan
/// time as `f32` minutes and 6 unused bytes.
pub fn parse_func_index(buffer: &[u8]) -> Result<FuncIndex> {
    if buffer.len() % INDEX_ENTRY_LEN != 0 {
        return Err(DecodeError::InvalidArgument(format!(
            "index length {} is not a multiple of {INDEX_ENTRY_LEN}",
            buffer.len()
        )));
    }
    let num_scans = buffer.len() / INDEX_ENTRY_LEN;

    let mut offsets = try_alloc(num_scans)?;
    let mut counts = try_alloc(num_scans)?;
    let mut times = try_alloc(num_scans)?;

    let mut cursor = ByteCursor::new(buffer);
    for scan in 0..num_scans {
        offsets.push(cursor.read_u32::<LittleEndian>()?);
        let info = cursor.read_u32::<LittleEndian>()?;
        if info & CALIBRATED_FLAG != 0 {
            return Err(DecodeError::InvalidArgument(format!(
                "scan {scan} carries the calibrated flag"
            )));
        }
        counts.push((info & PAIR_COUNT_MASK) as usize);
        cursor.skip(4)?; // TIC
        times.push(cursor.read_f32::<LittleEndian>()?);
        cursor.skip(6)?;
    }

    Ok(FuncIndex {
        offsets,
        counts,
        times,
    })
}

/// One function record of `_FUNCTNS.INF`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncInfo {
    /// Function type (low 5 bits of the packed word)
    pub function: u16,
    /// Data format (high 6 bits of the packed word)
    pub form: u16,
    /// Scans acquired by the function
    pub num_scans: u32,
    /// Q1 set masses; the channel labels of 2-byte data
    pub q1: Vec<f32>,
    /// Q3 set masses
    pub q3: Vec<f32>,
}

impl FuncInfo {
    /// The `q1` masses widened to `f64`, for [`decode_pairs2`]
    pub fn labels(&self) -> Vec<f64> {
        self.q1.iter().map(|&mass| f64::from(mass)).collect()
    }
}

/// Parse a `_FUNCTNS.INF` buffer, one record per acquisition function.
///
/// Each 424-byte record holds a little-endian packed word (function type
/// and format), 16 unused bytes, the scan count, 10 unused bytes, 32
/// unused floats, then 32 `q1` and 34 `q3` floats of which the first 32
/// are kept.
pub fn parse_func_info(buffer: &[u8]) -> Result<Vec<FuncInfo>> {
    if buffer.is_empty() || buffer.len() % FUNC_INFO_RECORD_LEN != 0 {
        return Err(DecodeError::InvalidArgument(format!(
            "function info of {} bytes is not a whole number of {FUNC_INFO_RECORD_LEN}-byte records",
            buffer.len()
        )));
    }
    let num_records = buffer.len() / FUNC_INFO_RECORD_LEN;

    let mut records = try_alloc(num_records)?;
    let mut cursor = ByteCursor::new(buffer);
    for _ in 0..num_records {
        let packed = cursor.read_u16::<LittleEndian>()?;
        cursor.skip(16)?;
        let num_scans = cursor.read_u32::<LittleEndian>()?;
        cursor.skip(10)?;
        cursor.skip(FUNC_LABEL_COUNT * 4)?;
        let q1 = read_f32s(&mut cursor, FUNC_LABEL_COUNT)?;
        let q3 = read_f32s(&mut cursor, FUNC_LABEL_COUNT)?;
        cursor.skip(8)?;

        records.push(FuncInfo {
            function: packed & 0x1F,
            form: packed >> 10,
            num_scans,
            q1,
            q3,
        });
    }

    debug!("Parsed {} function records", records.len());
    Ok(records)
}

fn read_f32s(cursor: &mut ByteCursor<'_>, count: usize) -> Result<Vec<f32>> {
    let mut values = try_alloc(count)?;
    for _ in 0..count {
        values.push(cursor.read_f32::<LittleEndian>()?);
    }
    Ok(values)
}

/// Bytes per key/value pair in a `.DAT` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairWidth {
    /// Values only; keys come from the function header
    Two,
    /// 48-bit packed pairs
    Six,
    /// 64-bit packed pairs
    Eight,
}

impl PairWidth {
    /// Map a byte count to a width
    pub fn from_bytes(bytes: usize) -> Result<Self> {
        match bytes {
            2 => Ok(PairWidth::Two),
            6 => Ok(PairWidth::Six),
            8 => Ok(PairWidth::Eight),
            other => Err(DecodeError::InvalidArgument(format!(
                "unsupported pair width {other}"
            ))),
        }
    }

    /// Bytes per pair
    pub fn bytes(self) -> usize {
        match self {
            PairWidth::Two => 2,
            PairWidth::Six => 6,
            PairWidth::Eight => 8,
        }
    }
}

/// Mass calibration polynomial `c0 + c1*m + c2*m^2 + ...`
///
/// Evaluated in single precision, as the acquisition software does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    coefficients: Vec<f64>,
}

impl Calibration {
    /// Build from coefficients in ascending power order
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Coefficients in ascending power order
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Calibrate one uncalibrated mass
    pub fn apply(&self, mass: f64) -> f32 {
        let mut calibrated = 0f32;
        let mut power = 1f32;
        for &coeff in &self.coefficients {
            calibrated += coeff as f32 * power;
            power = (f64::from(power) * mass) as f32;
        }
        calibrated
    }
}

impl FromStr for Calibration {
    type Err = DecodeError;

    /// Parse a `$$ Cal Function` value list: comma separated, trailing
    /// empty field allowed.
    fn from_str(s: &str) -> Result<Self> {
        let coefficients = s
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(|field| {
                field.parse::<f64>().map_err(|e| {
                    DecodeError::InvalidArgument(format!(
                        "bad calibration coefficient '{field}': {e}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(coefficients))
    }
}

/// Round to `precision` decimals, ties to even
///
/// Precisions above [`MAX_PRECISION`] round as [`MAX_PRECISION`].
pub fn round_key(key: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    (key * factor).round_ties_even() / factor
}

/// [`round_key`] in single precision, for calibrated keys
fn round_key_f32(key: f32, precision: u32) -> f32 {
    let factor = 10f32.powi(precision.min(MAX_PRECISION) as i32);
    (key * factor).round_ties_even() / factor
}

/// Densified function data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncSpectra<T> {
    /// Distinct keys (m/z or channel labels), increasing
    pub keys: Vec<f64>,
    /// Values, `scans x keys`
    pub intensities: IntensityMatrix<T>,
}

/// Output of [`decode_func`], typed by pair width
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FuncData {
    /// 2-byte pairs
    Counts(FuncSpectra<u32>),
    /// 6-byte pairs
    Integer(FuncSpectra<i64>),
    /// 8-byte pairs
    Float(FuncSpectra<f64>),
}

impl FuncData {
    /// `(scans, keys)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            FuncData::Counts(spectra) => spectra.intensities.shape(),
            FuncData::Integer(spectra) => spectra.intensities.shape(),
            FuncData::Float(spectra) => spectra.intensities.shape(),
        }
    }

    /// Distinct keys
    pub fn keys(&self) -> &[f64] {
        match self {
            FuncData::Counts(spectra) => &spectra.keys,
            FuncData::Integer(spectra) => &spectra.keys,
            FuncData::Float(spectra) => &spectra.keys,
        }
    }
}

/// Decode a `.DAT` buffer with the given pair width.
///
/// 2-byte data has no keys of its own; its columns are labelled with the
/// `q1` masses of `info`, which is required for that width and ignored
/// otherwise.
pub fn decode_func(
    buffer: &[u8],
    index: &FuncIndex,
    width: PairWidth,
    precision: u32,
    calibration: Option<&Calibration>,
    info: Option<&FuncInfo>,
) -> Result<FuncData> {
    match width {
        PairWidth::Two => {
            let info = info.ok_or_else(|| {
                DecodeError::InvalidArgument(
                    "2-byte data needs the function info record for its channel labels".into(),
                )
            })?;
            decode_pairs2(buffer, &index.counts, &info.labels()).map(FuncData::Counts)
        }
        PairWidth::Six => {
            decode_pairs6(buffer, &index.counts, precision, calibration).map(FuncData::Integer)
        }
        PairWidth::Eight => {
            decode_pairs8(buffer, &index.counts, precision, calibration).map(FuncData::Float)
        }
    }
}

fn check_length(buffer: &[u8], counts: &[usize], width: PairWidth) -> Result<usize> {
    let total: usize = counts.iter().sum();
    let expected = checked_extent(total, width.bytes(), "pair data")?;
    if buffer.len() != expected {
        return Err(DecodeError::InvalidArgument(format!(
            "{} pairs of {} bytes need {expected} bytes, buffer holds {}",
            total,
            width.bytes(),
            buffer.len()
        )));
    }
    Ok(total)
}

/// Decode 2-byte values: `(raw >> 3) * 4^(raw & 7)`.
///
/// Every scan must hold the same number of values; `axis` supplies the
/// key of each column and must be at least that long.
pub fn decode_pairs2(buffer: &[u8], counts: &[usize], axis: &[f64]) -> Result<FuncSpectra<u32>> {
    let channels = counts.first().copied().unwrap_or(0);
    if counts.iter().any(|&count| count != channels) {
        return Err(DecodeError::InvalidArgument(
            "2-byte data needs the same value count in every scan".into(),
        ));
    }
    if axis.len() < channels {
        return Err(DecodeError::InvalidArgument(format!(
            "{channels} channels but only {} axis labels",
            axis.len()
        )));
    }
    let total = check_length(buffer, counts, PairWidth::Two)?;

    let mut values = try_alloc(total)?;
    let mut cursor = ByteCursor::new(buffer);
    for _ in 0..total {
        let raw = cursor.read_u16::<LittleEndian>()?;
        values.push(u32::from(raw >> 3) << (2 * u32::from(raw & 0x7)));
    }

    Ok(FuncSpectra {
        keys: axis[..channels].to_vec(),
        intensities: IntensityMatrix::from_vec(counts.len(), channels, values)?,
    })
}

/// Split a 48-bit pair into its uncalibrated key and integer value.
pub fn unpack_pair6(raw: u64) -> (f64, i64) {
    let key_base = (raw & 0xFFFF_FE00_0000) >> 25;
    let key_power = ((raw & 0x1F0_0000) >> 20) as i32 - 23;
    let key = key_base as f64 * 2f64.powi(key_power);

    let value_base = i64::from((raw & 0xFFFF) as u16 as i16);
    let value_power = ((raw & 0xF_0000) >> 16) as u32;
    (key, value_base << (2 * value_power))
}

/// Decode 6-byte pairs into a dense integer matrix.
pub fn decode_pairs6(
    buffer: &[u8],
    counts: &[usize],
    precision: u32,
    calibration: Option<&Calibration>,
) -> Result<FuncSpectra<i64>> {
    let total = check_length(buffer, counts, PairWidth::Six)?;

    let mut keys = try_alloc(total)?;
    let mut values = try_alloc(total)?;
    let mut cursor = ByteCursor::new(buffer);
    for _ in 0..total {
        let low = u64::from(cursor.read_u32::<LittleEndian>()?);
        let high = u64::from(cursor.read_u16::<LittleEndian>()?);
        let (key, value) = unpack_pair6(low | (high << 32));
        keys.push(finish_key(key, precision, calibration));
        values.push(value);
    }

    densify_func(counts, &keys, &values)
}

/// `bits / 2^width`, the fractional part carried in the low `width` bits
fn fraction(bits: u64, width: u32) -> f64 {
    bits as f64 / (1u64 << width) as f64
}

/// Split a 64-bit pair into its uncalibrated key and value.
///
/// Both halves are variable split fixed-point numbers: a prefix gives how
/// many of the following bits form the integer part, the rest are the
/// fraction. Value integer widths above 21 are clamped and the excess is
/// applied as a left shift.
pub fn unpack_pair8(raw: u64) -> (f64, f64) {
    let key_bits = raw >> 28;
    let key_int_width = (key_bits >> 31) as u32;
    let key_frac_width = 31 - key_int_width;
    let key_int = (key_bits >> key_frac_width) & ((1u64 << key_int_width) - 1);
    let key_frac = fraction(key_bits & ((1u64 << key_frac_width) - 1), key_frac_width);

    let value_bits = raw & 0xFFF_FFFF;
    let mut value_int_width = (value_bits >> 22) as u32;
    let mut shift = 0;
    if value_int_width > 21 {
        shift = value_int_width - 21;
        value_int_width = 21;
    }
    let value_frac_width = 21 - value_int_width;
    let value_int =
        ((value_bits >> value_frac_width) & ((1u64 << value_int_width) - 1)) << shift;
    let value_frac = fraction(value_bits & ((1u64 << value_frac_width) - 1), value_frac_width);

    (key_int as f64 + key_frac, value_int as f64 + value_frac)
}

/// Decode 8-byte pairs into a dense floating-point matrix.
pub fn decode_pairs8(
    buffer: &[u8],
    counts: &[usize],
    precision: u32,
    calibration: Option<&Calibration>,
) -> Result<FuncSpectra<f64>> {
    let total = check_length(buffer, counts, PairWidth::Eight)?;

    let mut keys = try_alloc(total)?;
    let mut values = try_alloc(total)?;
    let mut cursor = ByteCursor::new(buffer);
    for _ in 0..total {
        let (key, value) = unpack_pair8(cursor.read_u64::<LittleEndian>()?);
        keys.push(finish_key(key, precision, calibration));
        values.push(value);
    }

    densify_func(counts, &keys, &values)
}

fn finish_key(key: f64, precision: u32, calibration: Option<&Calibration>) -> f64 {
    match calibration {
        // calibrated keys stay single precision through rounding
        Some(calibration) => f64::from(round_key_f32(calibration.apply(key), precision)),
        None => round_key(key, precision),
    }
}

fn densify_func<T>(counts: &[usize], keys: &[f64], values: &[T]) -> Result<FuncSpectra<T>>
where
    T: Copy + Default + std::ops::AddAssign + Send + Sync,
{
    let (keys, intensities) = densify(SparseScans {
        counts,
        keys,
        values,
    })?;
    debug!(
        "Decoded function data: {} scans x {} keys",
        intensities.rows(),
        intensities.cols()
    );
    Ok(FuncSpectra { keys, intensities })
}

/// Single-channel analog trace (`_CHROnnn.DAT`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogTrace {
    /// Sample times in minutes
    pub times: Vec<f32>,
    /// Sample values
    pub values: Vec<f32>,
}

/// Decode an analog trace: a 128-byte header followed by little-endian
/// `(f32 time, f32 value)` samples.
///
/// A file with no samples after the header yields an empty trace.
pub fn decode_analog_trace(buffer: &[u8]) -> Result<AnalogTrace> {
    let data_len = buffer.len().saturating_sub(ANALOG_HEADER_LEN);
    if data_len % 8 != 0 {
        return Err(DecodeError::InvalidArgument(format!(
            "analog data of {data_len} bytes is not a whole number of samples"
        )));
    }
    let samples = data_len / 8;

    let mut times = try_alloc(samples)?;
    let mut values = try_alloc(samples)?;
    if samples > 0 {
        let mut cursor = ByteCursor::at(buffer, ANALOG_HEADER_LEN)?;
        for _ in 0..samples {
            times.push(cursor.read_f32::<LittleEndian>()?);
            values.push(cursor.read_f32::<LittleEndian>()?);
        }
    }

    Ok(AnalogTrace { times, values })
}

/// Detector class of an analog signal, judged from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Detector {
    /// Charged aerosol detector
    Cad,
    /// Evaporative light scattering detector
    Elsd,
    /// Single-wavelength UV channel (`nm@` in the name)
    Uv,
}

/// One signal record of `_CHROMS.INF`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogInfo {
    /// Signal name
    pub name: String,
    /// Unit, when the record lists one
    pub unit: Option<String>,
}

impl AnalogInfo {
    /// Detector class implied by the signal name
    pub fn detector(&self) -> Option<Detector> {
        if self.name.contains("CAD") {
            Some(Detector::Cad)
        } else if self.name.contains("ELSD") {
            Some(Detector::Elsd)
        } else if self.name.contains("nm@") {
            Some(Detector::Uv)
        } else {
            None
        }
    }
}

/// Parse a `_CHROMS.INF` buffer into one entry per `_CHROnnn.DAT` file.
///
/// Records are fixed-width text starting at [`CHROM_INFO_START`]. After
/// stripping control bytes, `$CC$` markers and `(n)` suffixes, a record is
/// either a bare name or six comma separated fields ending in the unit. A
/// short final record is accepted.
pub fn parse_chrom_info(buffer: &[u8]) -> Result<Vec<AnalogInfo>> {
    let records = buffer.get(CHROM_INFO_START..).unwrap_or_default();

    let mut signals = try_alloc(records.len().div_ceil(CHROM_INFO_RECORD_LEN))?;
    for (index, record) in records.chunks(CHROM_INFO_RECORD_LEN).enumerate() {
        let text = clean_signal_text(record);
        let fields: Vec<&str> = text.split(',').collect();
        let unit = match fields.len() {
            1 => None,
            6 => Some(fields[5].to_string()),
            other => {
                return Err(DecodeError::InvalidArgument(format!(
                    "signal record {index} has {other} fields, expected 1 or 6"
                )))
            }
        };
        signals.push(AnalogInfo {
            name: fields[0].to_string(),
            unit,
        });
    }
    Ok(signals)
}

fn clean_signal_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut cleaned = String::with_capacity(text.len());
    let mut rest: &str = &text;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("$CC$") {
            rest = tail;
            continue;
        }
        if c == '(' {
            let digits = rest[1..].bytes().take_while(|b| b.is_ascii_digit()).count();
            if rest[1 + digits..].starts_with(')') {
                rest = &rest[digits + 2..];
                continue;
            }
        }
        if !('\0'..='\x04').contains(&c) {
            cleaned.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    cleaned.trim().to_string()
}
