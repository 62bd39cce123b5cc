use crate::{KernelElem, KernelError, Result};
use rayon::prelude::*;

/// Computes the mean of every column of a row-major `[rows, cols]` matrix.
///
/// An empty matrix (zero rows) yields a vector of zeros.
pub fn cpu_column_mean<T>(data: &[T], shape: &[usize; 2]) -> Result<Vec<T>>
where
    T: KernelElem,
{
    let [rows, cols] = *shape;
    if data.len() != rows * cols {
        return Err(KernelError::ShapeMismatch {
            expected: vec![rows * cols],
            got: vec![data.len()],
        });
    }

    let mut sums = vec![T::zero(); cols];
    if rows == 0 || cols == 0 {
        return Ok(sums);
    }

    for row in data.chunks_exact(cols) {
        for (s, &v) in sums.iter_mut().zip(row) {
            *s += v;
        }
    }

    let count = T::from_usize(rows).ok_or_else(|| KernelError::ShapeMismatch {
        expected: vec![rows],
        got: vec![0],
    })?;
    for s in sums.iter_mut() {
        *s /= count;
    }
    Ok(sums)
}

/// Subtracts the column mean from every row of a row-major `[rows, cols]` matrix.
///
/// After centering, every column sums to zero (up to floating point error).
pub fn cpu_mean_center<T>(data: &[T], shape: &[usize; 2]) -> Result<Vec<T>>
where
    T: KernelElem,
{
    let mean = cpu_column_mean(data, shape)?;
    let cols = shape[1];
    let mut out = data.to_vec();
    if cols == 0 {
        return Ok(out);
    }

    out.par_chunks_mut(cols).for_each(|row| {
        for (v, &m) in row.iter_mut().zip(&mean) {
            *v -= m;
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_mean() {
        let data = vec![1.0, 2.0, 3.0, 5.0, 6.0, 7.0];
        let mean = cpu_column_mean(&data, &[2, 3]).unwrap();
        assert_eq!(mean, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_mean_center() {
        let data = vec![1.0f32, 2.0, 3.0, 5.0, 6.0, 7.0];
        let out = cpu_mean_center(&data, &[2, 3]).unwrap();
        assert_eq!(out, vec![-2.0, -2.0, -2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_mean_center_empty() {
        let data: Vec<f32> = vec![];
        assert!(cpu_mean_center(&data, &[0, 3]).unwrap().is_empty());
        assert_eq!(cpu_column_mean(&data, &[0, 3]).unwrap(), vec![0.0; 3]);
    }

    #[test]
    fn test_mean_center_shape_mismatch() {
        let data = vec![1.0f32, 2.0, 3.0];
        let err = cpu_mean_center(&data, &[2, 3]);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }
}
