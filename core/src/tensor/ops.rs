//! Tensor operations.
//!
//! The operations here are the ones the data pipeline needs:
//! - **Element-wise Mapping**: shifting node ids when edge lists are batched.
//! - **Row Reductions**: column means over the node axis and mean-centering.
//! - **Concatenation**: stacking per-sample matrices along the node axis for batching.
//! - **Random Initialization**: standard normal tensors for prior sampling.
//!
//! > [!NOTE]
//! > There is no general broadcasting; mean-centering ([`Tensor::center_rows`]) is the one
//! > row-wise broadcast the pipeline needs and is implemented directly.
//!
//! ```rust
//! use molgen_data::tensor::Tensor;
//!
//! let pos = Tensor::<f32, 2>::new(vec![1.0, 0.0, 2.0, 3.0, 4.0, 2.0], [2, 3]).unwrap();
//! let centered = pos.center_rows().unwrap();
//! assert_eq!(centered.data(), &[-1.0, -2.0, 0.0, 1.0, 2.0, 0.0]);
//! ```

use super::{Result, Tensor, TensorElem, TensorError};

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

impl<T, const RANK: usize> Tensor<T, RANK>
where
    T: TensorElem,
{
    /// Applies a function element-wise to the tensor.
    ///
    /// ```rust
    /// use molgen_data::tensor::Tensor;
    /// let t = Tensor::<i64, 1>::new(vec![0, 1, 2], [3]).unwrap();
    /// let shifted = t.map(|x| x + 10);
    /// assert_eq!(shifted.data(), &[10, 11, 12]);
    /// ```
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T + Sync + Send,
    {
        let mut out = Tensor::zeros(self.shape);
        out.data
            .par_iter_mut()
            .zip(self.data.par_iter())
            .for_each(|(o, i)| *o = f(*i));
        out
    }
}

impl<T> Tensor<T, 2>
where
    T: TensorElem,
{
    /// Number of rows (the node axis for per-node tensors).
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    /// Returns row `i` as a slice.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if `i >= rows`.
    pub fn row(&self, i: usize) -> Result<&[T]> {
        if i >= self.shape[0] {
            return Err(TensorError::IndexOutOfBounds {
                index: vec![i],
                shape: self.shape.to_vec(),
            });
        }
        let cols = self.shape[1];
        Ok(&self.data[i * cols..(i + 1) * cols])
    }

    /// Mean over dimension 0, shape `[1, cols]`.
    ///
    /// A tensor with zero rows has a zero mean.
    pub fn mean_rows(&self) -> Result<Self> {
        let mean = molgen_data_kernels::cpu_column_mean(&self.data, &self.shape)?;
        Tensor::new(mean, [1, self.shape[1]])
    }

    /// Subtracts the column means from every row, so each column sums to zero.
    pub fn center_rows(&self) -> Result<Self> {
        let data = molgen_data_kernels::cpu_mean_center(&self.data, &self.shape)?;
        let mut out = Tensor::new(data, self.shape)?;
        out.device = self.device.clone();
        Ok(out)
    }

    /// Concatenates matrices along dimension 0.
    ///
    /// All inputs must share the column count. With no inputs the result is `[0, cols]`.
    pub fn concat_rows(parts: &[Self], cols: usize) -> Result<Self> {
        let mut rows = 0;
        for part in parts {
            if part.shape[1] != cols {
                return Err(TensorError::ShapeMismatch {
                    expected: vec![part.shape[0], cols],
                    got: part.shape.to_vec(),
                });
            }
            rows += part.shape[0];
        }

        let mut data = Vec::with_capacity(rows * cols);
        for part in parts {
            data.extend_from_slice(&part.data);
        }
        Tensor::new(data, [rows, cols])
    }

    /// Returns rows `start..end` as a new tensor.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.shape[0] {
            return Err(TensorError::IndexOutOfBounds {
                index: vec![start, end],
                shape: self.shape.to_vec(),
            });
        }
        let cols = self.shape[1];
        Tensor::new(
            self.data[start * cols..end * cols].to_vec(),
            [end - start, cols],
        )
    }
}

impl<const RANK: usize> Tensor<f32, RANK> {
    /// Samples a tensor with i.i.d. standard normal entries.
    pub fn randn<R: Rng + ?Sized>(shape: [usize; RANK], rng: &mut R) -> Self {
        Tensor::from_fn(shape, |_| StandardNormal.sample(&mut *rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_map() {
        let a = Tensor::<f32, 1>::new(vec![1.0, 2.0, 3.0], [3]).unwrap();
        let b = a.map(|x| x * 2.0);
        assert_eq!(b.data(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_mean_and_center() {
        // Two atoms at x=1 and x=3
        let pos = Tensor::<f32, 2>::new(vec![1.0, 0.0, 2.0, 3.0, 4.0, 2.0], [2, 3]).unwrap();
        let mean = pos.mean_rows().unwrap();
        assert_eq!(mean.shape(), &[1, 3]);
        assert_eq!(mean.data(), &[2.0, 2.0, 2.0]);

        let centered = pos.center_rows().unwrap();
        assert_eq!(centered.data(), &[-1.0, -2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_concat_and_slice_rows() {
        let a = Tensor::<i64, 2>::new(vec![1, 2], [1, 2]).unwrap();
        let b = Tensor::<i64, 2>::new(vec![3, 4, 5, 6], [2, 2]).unwrap();
        let c = Tensor::concat_rows(&[a, b.clone()], 2).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        assert_eq!(c.data(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(c.row(2).unwrap(), &[5, 6]);
        assert_eq!(c.slice_rows(1, 3).unwrap(), b);

        assert!(c.slice_rows(2, 4).is_err());
        assert!(c.row(3).is_err());

        let empty = Tensor::<i64, 2>::concat_rows(&[], 5).unwrap();
        assert_eq!(empty.shape(), &[0, 5]);

        let bad = Tensor::<i64, 2>::zeros([1, 3]);
        assert!(Tensor::concat_rows(&[bad], 2).is_err());
    }

    #[test]
    fn test_randn_is_seeded() {
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        let a = Tensor::<f32, 2>::randn([4, 3], &mut rng1);
        let b = Tensor::<f32, 2>::randn([4, 3], &mut rng2);
        assert_eq!(a, b);
        assert!(a.data().iter().all(|v| v.is_finite()));
    }
}
