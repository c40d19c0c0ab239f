//! # Peak-list mass spectrum decoder
//!
//! Scans are stored as sparse, big-endian peak lists. Each scan carries its
//! own m/z codes, so the decoder first collects every scan, then builds a
//! global m/z axis and scatters the peaks onto it (see [`crate::densify`]).
//!
//! ## Layout
//!
//! A big-endian `u16` at the data offset gives the scan-block start as
//! `value * 2 - 2` (an absolute offset). Each scan then reads:
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 2 | scan header (skipped) |
//! | 4 | scan time in milliseconds, BE `u32` |
//! | 6 | skipped |
//! | 2 | peak count `P`, BE `u16` |
//! | 4 | skipped |
//! | 4·P | `(m/z code, packed intensity)` pairs, BE `u16` each |
//! | 10 | trailer before the next scan |
//!
//! ## Value encodings
//!
//! * m/z = `round(code / 20 * 10^prec) / 10^prec`
//! * intensity: top 2 bits are an exponent `e`, low 14 bits a mantissa `m`;
//!   the value is `m * 2^(3e)`.

use byteorder::BigEndian;
use log::{debug, warn};
use serde::Serialize;

use crate::cursor::ByteCursor;
use crate::densify::{densify, SparseScans};
use crate::error::{checked_extent, try_alloc, DecodeError, Result};
use crate::matrix::IntensityMatrix;

#[cfg(test)]
mod tests;

/// Bytes of scan header before the time value
const SCAN_HEADER_LEN: usize = 2;
/// Bytes between the time value and the peak count
const SCAN_META_LEN: usize = 6;
/// Bytes between the peak count and the first pair
const SCAN_PAD_LEN: usize = 4;
/// Bytes after the last pair of a scan
const SCAN_TRAILER_LEN: usize = 10;
/// Bytes per (m/z, intensity) pair
const PAIR_LEN: usize = 4;
/// Scan time ticks per minute
pub const TICKS_PER_MINUTE: f64 = 60_000.0;
/// Raw m/z codes are in units of 1/20 Th
pub const MZ_CODE_SCALE: f64 = 20.0;
/// Decimal places beyond this exceed what an `f64` m/z can represent;
/// larger precisions round as this many places
pub const MAX_PRECISION: u32 = 15;

/// Dense mass spectra decoded from a peak list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenseSpectra {
    /// Scan times in minutes
    pub times: Vec<f64>,
    /// Distinct rounded m/z values, strictly increasing
    pub mzs: Vec<f64>,
    /// Summed intensities, `scans x mzs`
    pub intensities: IntensityMatrix<f64>,
}

impl DenseSpectra {
    /// Number of scans
    pub fn num_scans(&self) -> usize {
        self.times.len()
    }
}

/// Decode a packed 16-bit intensity: `mantissa * 2^(3 * exponent)`
pub fn decode_packed_intensity(packed: u16) -> u64 {
    let mantissa = u64::from(packed & 0x3FFF);
    let exponent = u32::from(packed >> 14);
    mantissa << (3 * exponent)
}

/// Convert a raw m/z code to m/z rounded to `precision` decimal places
pub fn quantize_mz(code: u16, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    (f64::from(code) / MZ_CODE_SCALE * factor).round() / factor
}

/// Location of one scan's pairs, found in the first pass
#[derive(Debug, Clone, Copy)]
struct ScanEntry {
    time: f64,
    peaks: usize,
    pairs_offset: usize,
}

/// First pass: walk every scan header, stepping over the pairs.
fn index_scans(buffer: &[u8], data_offset: usize, num_scans: usize) -> Result<Vec<ScanEntry>> {
    let mut cursor = ByteCursor::at(buffer, data_offset)?;
    let start_word = cursor.read_u16::<BigEndian>()?;
    if start_word == 0 {
        return Err(DecodeError::InvalidArgument(
            "scan block start word is 0".to_string(),
        ));
    }
    cursor.seek(usize::from(start_word) * 2 - 2)?;

    let mut entries = try_alloc(num_scans)?;
    for scan in 0..num_scans {
        // The trailer of the last scan may be cut off; it is only skipped
        // once another scan follows.
        if scan > 0 {
            cursor.skip(SCAN_TRAILER_LEN)?;
        }
        cursor.skip(SCAN_HEADER_LEN)?;
        let time = f64::from(cursor.read_u32::<BigEndian>()?) / TICKS_PER_MINUTE;
        cursor.skip(SCAN_META_LEN)?;
        let peaks = usize::from(cursor.read_u16::<BigEndian>()?);
        cursor.skip(SCAN_PAD_LEN)?;
        let pairs_offset = cursor.position();
        cursor.skip(peaks * PAIR_LEN)?;

        entries.push(ScanEntry {
            time,
            peaks,
            pairs_offset,
        });
    }
    Ok(entries)
}

/// Decode a peak-list buffer into dense spectra.
///
/// `precision` is the number of decimal places m/z values are rounded to
/// before deduplication; 0 rounds to whole numbers and anything above
/// [`MAX_PRECISION`] rounds as [`MAX_PRECISION`]. Peaks of one scan that
/// round to the same m/z are summed.
///
/// # Errors
///
/// * `OutOfBounds` if `data_offset` lies past the end of the buffer (even
///   for zero scans), or a scan header or pair list runs past it
/// * `InvalidArgument` if the scan block start word is zero
/// * `AllocationFailure` if the output arrays cannot be allocated
pub fn decode_peak_list(
    buffer: &[u8],
    data_offset: u32,
    num_scans: u32,
    precision: u32,
) -> Result<DenseSpectra> {
    // The offset must lie within the buffer even when no scan is read.
    ByteCursor::at(buffer, data_offset as usize)?;

    let num_scans = num_scans as usize;
    // Each scan is at least header + time + meta + count + pad bytes.
    let min_scan = SCAN_HEADER_LEN + 4 + SCAN_META_LEN + 2 + SCAN_PAD_LEN;
    let min_extent = checked_extent(num_scans, min_scan, "scan block")?;
    if num_scans > 0 && min_extent > buffer.len() {
        return Err(DecodeError::OutOfBounds {
            offset: 0,
            width: min_extent,
            len: buffer.len(),
        });
    }

    if num_scans == 0 {
        return Ok(DenseSpectra {
            times: Vec::new(),
            mzs: Vec::new(),
            intensities: IntensityMatrix::zeros(0, 0)?,
        });
    }

    let entries = index_scans(buffer, data_offset as usize, num_scans)?;
    let total: usize = entries.iter().map(|entry| entry.peaks).sum();

    let mut times = try_alloc(num_scans)?;
    let mut counts = try_alloc(num_scans)?;
    let mut mzs = try_alloc(total)?;
    let mut values = try_alloc(total)?;

    // Second pass: decode the pairs the first pass located.
    for entry in &entries {
        times.push(entry.time);
        counts.push(entry.peaks);
        let mut cursor = ByteCursor::at(buffer, entry.pairs_offset)?;
        for _ in 0..entry.peaks {
            let code = cursor.read_u16::<BigEndian>()?;
            let packed = cursor.read_u16::<BigEndian>()?;
            mzs.push(quantize_mz(code, precision));
            values.push(decode_packed_intensity(packed) as f64);
        }
    }

    if total == 0 {
        warn!("Peak list holds {} scans but no peaks", num_scans);
    }

    let (axis, intensities) = densify(SparseScans {
        counts: &counts,
        keys: &mzs,
        values: &values,
    })?;

    debug!(
        "Decoded peak list: {} scans, {} peaks, {} distinct m/z at precision {}",
        num_scans,
        total,
        axis.len(),
        precision
    );

    Ok(DenseSpectra {
        times,
        mzs: axis,
        intensities,
    })
}
