//! Dense row-major intensity matrix

use serde::Serialize;

use crate::error::{checked_extent, try_filled, DecodeError, Result};

/// Dense 2-D array indexed `[record][channel]`
///
/// Rows are records (time points or scans), columns are channels
/// (wavelengths or measured-axis values). Storage is a single owned,
/// row-major `Vec<T>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityMatrix<T> {
    rows: usize,
    cols: usize,
    values: Vec<T>,
}

impl<T: Clone + Default> IntensityMatrix<T> {
    /// Allocate a `rows x cols` matrix filled with `T::default()`
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        let len = checked_extent(rows, cols, "matrix size")?;
        Ok(Self {
            rows,
            cols,
            values: try_filled(len, T::default())?,
        })
    }
}

impl<T> IntensityMatrix<T> {
    /// Wrap a row-major vector, checking that its length matches the shape
    pub fn from_vec(rows: usize, cols: usize, values: Vec<T>) -> Result<Self> {
        let len = checked_extent(rows, cols, "matrix size")?;
        if values.len() != len {
            return Err(DecodeError::InvalidArgument(format!(
                "matrix of shape {rows}x{cols} needs {len} values, got {}",
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// True when the matrix holds no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cell at `[row][col]`, if in range
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.values.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// One record's channels
    pub fn row(&self, row: usize) -> &[T] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    /// Mutable view of one record's channels
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        &mut self.values[row * self.cols..(row + 1) * self.cols]
    }

    /// Iterate over rows in record order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        // not chunks_exact: a zero-width matrix still has rows
        (0..self.rows).map(move |row| self.row(row))
    }

    /// Row-major backing storage
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Mutable row-major backing storage
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Give up the matrix and return its row-major storage
    pub fn into_vec(self) -> Vec<T> {
        self.values
    }
}
