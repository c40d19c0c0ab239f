//! Python bindings for rainbow
//!
//! Exposes the decoders as the `_rainbow` extension module. Callers pass the
//! file contents as `bytes` and receive NumPy arrays that own their data.
//!
//! # Example
//!
//! ```python
//! from rainbow import _rainbow
//!
//! with open("DAD1.UV", "rb") as f:
//!     raw = f.read()
//! times, data = _rainbow.decode_uv_delta(raw, 0x1000, 1200, 201)
//! print(data.shape)  # (1200, 201)
//! ```

pub(crate) mod exceptions;

use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::error::DecodeError;
use crate::matrix::IntensityMatrix;
use crate::ms::decode_peak_list;
use crate::python::exceptions::IntoPyResult;
use crate::uv::decode_delta_trace;

/// Reshape an owned matrix into a 2-D ndarray without copying
fn into_array2<T>(matrix: IntensityMatrix<T>) -> Result<Array2<T>, DecodeError> {
    let shape = matrix.shape();
    Array2::from_shape_vec(shape, matrix.into_vec())
        .map_err(|e| DecodeError::InvalidArgument(format!("matrix reshape failed: {e}")))
}

/// Decode a delta-coded UV trace
///
/// Args:
///     data: The full file contents
///     data_offset: Byte offset of the first record
///     num_times: Number of records
///     num_wavelengths: Channels per record
///
/// Returns:
///     tuple[numpy.ndarray, numpy.ndarray]: uint32 times of shape (N,) and
///     int64 absorbances of shape (N, C)
#[pyfunction]
#[pyo3(name = "decode_uv_delta")]
fn py_decode_uv_delta<'py>(
    py: Python<'py>,
    data: &Bound<'py, PyBytes>,
    data_offset: u32,
    num_times: u32,
    num_wavelengths: u32,
) -> PyResult<(Bound<'py, PyArray1<u32>>, Bound<'py, PyArray2<i64>>)> {
    let buffer = data.as_bytes();
    let (times, matrix) = py
        .allow_threads(|| {
            decode_delta_trace(buffer, data_offset, num_times, num_wavelengths)
                .and_then(|trace| Ok((trace.times, into_array2(trace.intensities)?)))
        })
        .into_py_result()?;

    Ok((times.into_pyarray_bound(py), matrix.into_pyarray_bound(py)))
}

/// Decode a peak-list mass spectrum into dense arrays
///
/// Args:
///     data: The full file contents
///     data_offset: Byte offset of the scan-block start word
///     num_times: Number of scans
///     prec: Decimal places m/z values are rounded to (default 0)
///
/// Returns:
///     tuple[numpy.ndarray, numpy.ndarray, numpy.ndarray]: float64 times in
///     minutes (N,), float64 m/z values (U,) and float64 intensities (N, U)
#[pyfunction]
#[pyo3(name = "decode_ms", signature = (data, data_offset, num_times, prec=0))]
fn py_decode_ms<'py>(
    py: Python<'py>,
    data: &Bound<'py, PyBytes>,
    data_offset: u32,
    num_times: u32,
    prec: u32,
) -> PyResult<(
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray2<f64>>,
)> {
    let buffer = data.as_bytes();
    let (times, mzs, matrix) = py
        .allow_threads(|| {
            decode_peak_list(buffer, data_offset, num_times, prec).and_then(|spectra| {
                Ok((spectra.times, spectra.mzs, into_array2(spectra.intensities)?))
            })
        })
        .into_py_result()?;

    Ok((
        times.into_pyarray_bound(py),
        mzs.into_pyarray_bound(py),
        matrix.into_pyarray_bound(py),
    ))
}

/// Initialize the _rainbow Python module
#[pymodule]
fn _rainbow(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Initialize logging bridge to Python's logging module
    pyo3_log::init();

    // Register exception types
    m.add("RainbowException", py.get_type_bound::<exceptions::RainbowException>())?;
    m.add("RainbowBoundsError", py.get_type_bound::<exceptions::RainbowBoundsError>())?;
    m.add("RainbowArgumentError", py.get_type_bound::<exceptions::RainbowArgumentError>())?;
    m.add("RainbowAllocationError", py.get_type_bound::<exceptions::RainbowAllocationError>())?;

    m.add_function(wrap_pyfunction!(py_decode_uv_delta, m)?)?;
    m.add_function(wrap_pyfunction!(py_decode_ms, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
