//! # rainbow - Binary waveform decoders for chromatography data
//!
//! `rainbow` turns the compact binary data regions of instrument files into
//! dense numeric arrays: a time axis and a `time x channel` intensity matrix.
//! Every decoder borrows a byte buffer, never reads past its end, and hands
//! back freshly allocated, owned arrays.
//!
//! ## Decoders
//!
//! - [`uv`]: delta-coded UV/absorbance traces with 32-bit resync escapes
//! - [`ms`]: sparse peak-list mass spectra, densified onto a global m/z axis
//! - [`masslynx`]: Waters MassLynx `_FUNC` index/data pairs, function and
//!   signal info records, and analog traces
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rainbow::{decode_delta_trace, decode_peak_list};
//!
//! let bytes = std::fs::read("DAD1.UV")?;
//! let trace = decode_delta_trace(&bytes, 0x1000, 1200, 201)?;
//! println!("{} records x {} wavelengths", trace.num_records(), trace.num_channels());
//!
//! let bytes = std::fs::read("MSD1.MS")?;
//! let spectra = decode_peak_list(&bytes, 0x10A, 3000, 1)?;
//! println!("{} scans over {} m/z values", spectra.num_scans(), spectra.mzs.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Locating the data offset and record counts in a file header is the
//! caller's job; the decoders only validate what they need to stay in
//! bounds.
//!
//! ## Errors
//!
//! All decoders return [`DecodeError`]: `OutOfBounds` when a read would
//! pass the end of the buffer, `InvalidArgument` when the parameters cannot
//! describe a valid layout, and `AllocationFailure` when the output arrays
//! cannot be allocated. A failed call never returns partial arrays.

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod cursor;
pub mod densify;
pub mod error;
pub mod masslynx;
pub mod matrix;
pub mod ms;
pub mod uv;

// Python bindings module (only compiled with the "python" feature)
#[cfg(feature = "python")]
mod python;

pub use error::{DecodeError, Result};
pub use matrix::IntensityMatrix;
pub use ms::{decode_peak_list, DenseSpectra};
pub use uv::{decode_delta_trace, DeltaTrace};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::cursor::ByteCursor;
    pub use crate::error::{DecodeError, Result};
    pub use crate::masslynx::{
        decode_analog_trace, decode_func, parse_chrom_info, parse_func_index, parse_func_info,
        AnalogInfo, AnalogTrace, Calibration, Detector, FuncData, FuncIndex, FuncInfo,
        FuncSpectra, PairWidth,
    };
    pub use crate::matrix::IntensityMatrix;
    pub use crate::ms::{decode_packed_intensity, decode_peak_list, quantize_mz, DenseSpectra};
    pub use crate::uv::{decode_delta_trace, decode_delta_trace_indexed, index_records, DeltaTrace};
}
