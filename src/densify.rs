//! Scatter sparse per-scan peaks onto a shared measured axis
//!
//! Peak lists are misaligned from scan to scan. To build a dense matrix the
//! distinct axis values of *all* scans are collected into one sorted,
//! deduplicated axis, and each peak is added into the column found by a
//! lower-bound search on that axis.

use std::ops::AddAssign;

use log::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{try_alloc, DecodeError, Result};
use crate::matrix::IntensityMatrix;

/// Flat peak arrays for a run of scans
///
/// Scan `i` owns `counts[i]` consecutive entries of `keys`/`values`.
#[derive(Debug, Clone, Copy)]
pub struct SparseScans<'a, T> {
    /// Peak count per scan
    pub counts: &'a [usize],
    /// Measured-axis value of each peak
    pub keys: &'a [f64],
    /// Intensity of each peak
    pub values: &'a [T],
}

/// Sort and deduplicate the measured-axis values.
///
/// Equality is exact: values are expected to be rounded already.
pub fn unique_axis(keys: &[f64]) -> Result<Vec<f64>> {
    let mut axis = try_alloc(keys.len())?;
    axis.extend_from_slice(keys);
    axis.sort_unstable_by(f64::total_cmp);
    axis.dedup();
    axis.shrink_to_fit();
    Ok(axis)
}

/// First index whose axis value is `>= value`.
pub fn lower_bound(axis: &[f64], value: f64) -> usize {
    axis.partition_point(|&probe| probe < value)
}

/// Build the shared axis and the dense `scans x axis` matrix.
///
/// Peaks that land on the same column of the same scan are summed.
pub fn densify<T>(scans: SparseScans<'_, T>) -> Result<(Vec<f64>, IntensityMatrix<T>)>
where
    T: Copy + Default + AddAssign + Send + Sync,
{
    let total: usize = scans.counts.iter().sum();
    if total != scans.keys.len() || total != scans.values.len() {
        return Err(DecodeError::InvalidArgument(format!(
            "peak counts sum to {total} but {} keys and {} values were given",
            scans.keys.len(),
            scans.values.len()
        )));
    }

    let axis = unique_axis(scans.keys)?;
    let mut matrix = IntensityMatrix::zeros(scans.counts.len(), axis.len())?;

    if !axis.is_empty() {
        let mut starts = try_alloc(scans.counts.len())?;
        let mut next = 0;
        for &count in scans.counts {
            starts.push(next);
            next += count;
        }

        let place = |((row, &start), &count): ((&mut [T], &usize), &usize)| {
            let keys = &scans.keys[start..start + count];
            let values = &scans.values[start..start + count];
            for (&key, &value) in keys.iter().zip(values) {
                row[lower_bound(&axis, key)] += value;
            }
        };

        let cols = axis.len();

        #[cfg(feature = "parallel")]
        matrix
            .as_mut_slice()
            .par_chunks_mut(cols)
            .zip(starts.par_iter())
            .zip(scans.counts.par_iter())
            .for_each(place);

        #[cfg(not(feature = "parallel"))]
        matrix
            .as_mut_slice()
            .chunks_mut(cols)
            .zip(starts.iter())
            .zip(scans.counts.iter())
            .for_each(place);
    }

    debug!(
        "Densified {} peaks over {} scans onto {} axis values",
        total,
        scans.counts.len(),
        axis.len()
    );

    Ok((axis, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_axis_sorted_and_deduplicated() {
        let axis = unique_axis(&[5.0, 1.5, 5.0, 3.0, 1.5]).unwrap();
        assert_eq!(axis, vec![1.5, 3.0, 5.0]);
        assert!(axis.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_lower_bound() {
        let axis = [1.0, 2.0, 4.0];
        assert_eq!(lower_bound(&axis, 0.5), 0);
        assert_eq!(lower_bound(&axis, 1.0), 0);
        assert_eq!(lower_bound(&axis, 3.0), 2);
        assert_eq!(lower_bound(&axis, 4.0), 2);
        assert_eq!(lower_bound(&axis, 9.0), 3);
    }

    #[test]
    fn test_densify_sums_collisions() {
        let counts = [3, 1];
        let keys = [100.0, 101.0, 100.0, 101.0];
        let values = [1.0, 2.0, 4.0, 8.0];

        let (axis, matrix) = densify(SparseScans {
            counts: &counts,
            keys: &keys,
            values: &values,
        })
        .unwrap();

        assert_eq!(axis, vec![100.0, 101.0]);
        assert_eq!(matrix.row(0), &[5.0, 2.0]);
        assert_eq!(matrix.row(1), &[0.0, 8.0]);
    }

    #[test]
    fn test_densify_empty_scans() {
        let counts = [0, 0, 0];
        let (axis, matrix) = densify::<i64>(SparseScans {
            counts: &counts,
            keys: &[],
            values: &[],
        })
        .unwrap();

        assert!(axis.is_empty());
        assert_eq!(matrix.shape(), (3, 0));
    }

    #[test]
    fn test_densify_count_mismatch() {
        let err = densify(SparseScans {
            counts: &[2],
            keys: &[1.0],
            values: &[1u64],
        })
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArgument(_)));
    }
}
