//! Python exception types for rainbow
//!
//! Maps [`DecodeError`] variants to a small exception hierarchy.

use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;

use crate::error::DecodeError;

// Define custom exception hierarchy
create_exception!(_rainbow, RainbowException, PyException, "Base exception for all rainbow errors.");
create_exception!(_rainbow, RainbowBoundsError, RainbowException, "A read ran past the end of the buffer.");
create_exception!(_rainbow, RainbowArgumentError, RainbowException, "Parameters do not describe a valid layout.");
create_exception!(_rainbow, RainbowAllocationError, RainbowException, "Output arrays could not be allocated.");

/// Convert DecodeError to Python exception
impl From<DecodeError> for PyErr {
    fn from(err: DecodeError) -> Self {
        match &err {
            DecodeError::OutOfBounds { .. } => RainbowBoundsError::new_err(err.to_string()),
            DecodeError::InvalidArgument(_) => RainbowArgumentError::new_err(err.to_string()),
            DecodeError::AllocationFailure { .. } => {
                RainbowAllocationError::new_err(err.to_string())
            }
        }
    }
}

/// Helper trait for converting Results to PyResults
pub trait IntoPyResult<T> {
    fn into_py_result(self) -> PyResult<T>;
}

impl<T, E: Into<PyErr>> IntoPyResult<T> for Result<T, E> {
    fn into_py_result(self) -> PyResult<T> {
        self.map_err(Into::into)
    }
}
