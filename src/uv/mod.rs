//! # Delta-coded UV trace decoder
//!
//! Absorbance traces are stored as a run of fixed-header records, one per
//! time point. Each record carries a little-endian tick count and one 16-bit
//! signed delta per wavelength:
//!
//! ```text
//! +--------+----------+-----------+------------------------------------+
//! | tag(4) | time(4)  | meta(14)  | token(2) [resync(4)] ... x channels |
//! +--------+----------+-----------+------------------------------------+
//! ```
//!
//! A token adds to a running accumulator that starts at zero for each
//! record. The token `-32768` cannot occur as a genuine delta and marks a
//! resync: the accumulator is replaced by the little-endian `i32` that
//! follows. Because resyncs widen a record by four bytes, records have no
//! fixed stride.
//!
//! ```
//! use rainbow::uv::decode_delta_trace;
//!
//! let mut buf = vec![0u8; 4];
//! buf.extend_from_slice(&7u32.to_le_bytes());
//! buf.extend_from_slice(&[0u8; 14]);
//! for token in [10i16, -32768] {
//!     buf.extend_from_slice(&token.to_le_bytes());
//! }
//! buf.extend_from_slice(&100i32.to_le_bytes());
//! buf.extend_from_slice(&5i16.to_le_bytes());
//!
//! let trace = decode_delta_trace(&buf, 0, 1, 3)?;
//! assert_eq!(trace.times, vec![7]);
//! assert_eq!(trace.intensities.row(0), &[10, 100, 105]);
//! # Ok::<(), rainbow::DecodeError>(())
//! ```

use byteorder::LittleEndian;
use log::debug;
use serde::Serialize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cursor::ByteCursor;
use crate::error::{checked_extent, try_alloc, DecodeError, Result};
use crate::matrix::IntensityMatrix;


/// Token value reserved for a 32-bit resync
pub const ESCAPE_TOKEN: i16 = i16::MIN;

/// Uninterpreted tag preceding the time value
const RECORD_TAG_LEN: usize = 4;
/// Uninterpreted metadata between the time value and the channel tokens
const RECORD_META_LEN: usize = 14;
/// Fixed bytes per record before the first token
pub const RECORD_HEADER_LEN: usize = RECORD_TAG_LEN + 4 + RECORD_META_LEN;

/// Decoded UV trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaTrace {
    /// Raw tick value of each record, in record order
    pub times: Vec<u32>,
    /// Absorbance values, `records x channels`
    pub intensities: IntensityMatrix<i64>,
}

impl DeltaTrace {
    /// Number of decoded records
    pub fn num_records(&self) -> usize {
        self.times.len()
    }

    /// Number of channels (wavelengths) per record
    pub fn num_channels(&self) -> usize {
        self.intensities.cols()
    }
}

/// Validated record geometry for one decode call
#[derive(Debug, Clone, Copy)]
struct TraceLayout {
    data_offset: usize,
    records: usize,
    channels: usize,
}

impl TraceLayout {
    /// Check the parameters against the buffer before anything is allocated.
    ///
    /// Every record is at least `RECORD_HEADER_LEN + 2 * channels` bytes, so
    /// a buffer shorter than that many bytes per record can be rejected
    /// without scanning it.
    fn new(buffer: &[u8], data_offset: u32, records: u32, channels: u32) -> Result<Self> {
        let layout = Self {
            data_offset: data_offset as usize,
            records: records as usize,
            channels: channels as usize,
        };

        let token_bytes = checked_extent(layout.channels, 2, "record width")?;
        let min_record = RECORD_HEADER_LEN
            .checked_add(token_bytes)
            .ok_or_else(|| DecodeError::InvalidArgument("record width overflows".into()))?;
        let min_extent = checked_extent(layout.records, min_record, "data extent")?;
        checked_extent(layout.records, layout.channels, "matrix size")?;

        let mut cursor = ByteCursor::at(buffer, layout.data_offset)?;
        cursor.ensure(min_extent)?;
        Ok(layout)
    }
}

/// Decode one record's header and tokens into `row`.
///
/// Returns the record's time and how many resync tokens it held.
fn decode_record(cursor: &mut ByteCursor<'_>, row: &mut [i64]) -> Result<(u32, usize)> {
    cursor.skip(RECORD_TAG_LEN)?;
    let time = cursor.read_u32::<LittleEndian>()?;
    cursor.skip(RECORD_META_LEN)?;

    let mut escapes = 0;
    let mut accum: i64 = 0;
    for cell in row.iter_mut() {
        let token = cursor.read_i16::<LittleEndian>()?;
        if token == ESCAPE_TOKEN {
            accum = i64::from(cursor.read_i32::<LittleEndian>()?);
            escapes += 1;
        } else {
            accum += i64::from(token);
        }
        *cell = accum;
    }
    Ok((time, escapes))
}

/// Decode a delta-coded UV trace.
///
/// Reads `num_records` records of `num_channels` tokens each, starting at
/// `data_offset`. The call either decodes every record or fails; no partial
/// arrays are returned.
///
/// # Errors
///
/// * `OutOfBounds` if `data_offset` lies past the end of `buffer` (even
///   for zero records), or any read would run past it
/// * `InvalidArgument` if the record geometry overflows the address space
/// * `AllocationFailure` if the output arrays cannot be allocated
pub fn decode_delta_trace(
    buffer: &[u8],
    data_offset: u32,
    num_records: u32,
    num_channels: u32,
) -> Result<DeltaTrace> {
    let layout = TraceLayout::new(buffer, data_offset, num_records, num_channels)?;

    let mut times = try_alloc(layout.records)?;
    let mut intensities = IntensityMatrix::zeros(layout.records, layout.channels)?;
    let mut cursor = ByteCursor::at(buffer, layout.data_offset)?;

    let mut escapes = 0;
    for record in 0..layout.records {
        let (time, record_escapes) = decode_record(&mut cursor, intensities.row_mut(record))?;
        times.push(time);
        escapes += record_escapes;
    }

    debug!(
        "Decoded UV trace: {} records x {} channels, {} resyncs, {} bytes consumed",
        layout.records,
        layout.channels,
        escapes,
        cursor.position() - layout.data_offset
    );

    Ok(DeltaTrace { times, intensities })
}

/// Locate the start offset of every record.
///
/// Walks the token stream without accumulating, stepping over the four-byte
/// payload of each resync. The returned offsets let records be decoded
/// independently.
pub fn index_records(
    buffer: &[u8],
    data_offset: u32,
    num_records: u32,
    num_channels: u32,
) -> Result<Vec<usize>> {
    let layout = TraceLayout::new(buffer, data_offset, num_records, num_channels)?;
    index_layout(buffer, &layout)
}

fn index_layout(buffer: &[u8], layout: &TraceLayout) -> Result<Vec<usize>> {
    let mut offsets = try_alloc(layout.records)?;
    let mut cursor = ByteCursor::at(buffer, layout.data_offset)?;

    for _ in 0..layout.records {
        offsets.push(cursor.position());
        cursor.skip(RECORD_HEADER_LEN)?;
        for _ in 0..layout.channels {
            if cursor.read_i16::<LittleEndian>()? == ESCAPE_TOKEN {
                cursor.skip(4)?;
            }
        }
    }
    Ok(offsets)
}

/// Decode a UV trace with a sequential index pass followed by per-record
/// decoding.
///
/// With the `parallel` feature the per-record pass runs on the rayon pool;
/// without it the records are decoded in order. The result is identical to
/// [`decode_delta_trace`].
pub fn decode_delta_trace_indexed(
    buffer: &[u8],
    data_offset: u32,
    num_records: u32,
    num_channels: u32,
) -> Result<DeltaTrace> {
    let layout = TraceLayout::new(buffer, data_offset, num_records, num_channels)?;
    let offsets = index_layout(buffer, &layout)?;

    let mut intensities = IntensityMatrix::zeros(layout.records, layout.channels)?;

    // Zero channels leaves nothing to chunk; only the times need reading.
    if layout.channels == 0 {
        let mut times = try_alloc(layout.records)?;
        for &offset in &offsets {
            let (time, _) = decode_record(&mut ByteCursor::at(buffer, offset)?, &mut [])?;
            times.push(time);
        }
        return Ok(DeltaTrace { times, intensities });
    }

    let decode_at = |(&offset, row): (&usize, &mut [i64])| -> Result<u32> {
        let mut cursor = ByteCursor::at(buffer, offset)?;
        decode_record(&mut cursor, row).map(|(time, _)| time)
    };

    #[cfg(feature = "parallel")]
    let times: Vec<u32> = offsets
        .par_iter()
        .zip(intensities.as_mut_slice().par_chunks_mut(layout.channels))
        .map(decode_at)
        .collect::<Result<_>>()?;

    #[cfg(not(feature = "parallel"))]
    let times: Vec<u32> = offsets
        .iter()
        .zip(intensities.as_mut_slice().chunks_mut(layout.channels))
        .map(decode_at)
        .collect::<Result<_>>()?;

    debug!(
        "Decoded UV trace via record index: {} records x {} channels",
        layout.records, layout.channels
    );

    Ok(DeltaTrace { times, intensities })
}
