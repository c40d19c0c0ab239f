//! Error type shared by every decoder

/// Errors that can occur while decoding a waveform buffer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A read would run past the end of the supplied buffer
    #[error("Read of {width} bytes at offset {offset} exceeds buffer length {len}")]
    OutOfBounds {
        /// Cursor position at the time of the read
        offset: usize,
        /// Number of bytes requested
        width: usize,
        /// Length of the buffer
        len: usize,
    },

    /// The parameters cannot describe a valid record layout
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An output array could not be allocated
    #[error("Failed to allocate {elements} output elements")]
    AllocationFailure {
        /// Number of elements requested
        elements: usize,
    },
}

/// Result alias used by every decoder in the crate
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Allocate an output vector with exactly `elements` capacity, reporting
/// allocator failure instead of aborting.
pub(crate) fn try_alloc<T>(elements: usize) -> Result<Vec<T>> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(elements)
        .map_err(|_| DecodeError::AllocationFailure { elements })?;
    Ok(values)
}

/// Allocate a vector of `elements` copies of `fill`.
pub(crate) fn try_filled<T: Clone>(elements: usize, fill: T) -> Result<Vec<T>> {
    let mut values = try_alloc(elements)?;
    values.resize(elements, fill);
    Ok(values)
}

/// Multiply two sizes, mapping overflow to `InvalidArgument`.
pub(crate) fn checked_extent(a: usize, b: usize, what: &str) -> Result<usize> {
    a.checked_mul(b).ok_or_else(|| {
        DecodeError::InvalidArgument(format!("{what} overflows: {a} x {b}"))
    })
}
