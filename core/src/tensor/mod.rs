//! Core Tensor implementation.
//!
//! Every per-sample field handled by the loaders (positions, one-hot atom features,
//! charges, prior noise, edge indices) is a [`Tensor`]: a flat vector of elements plus a
//! shape and row-major strides.
//!
//! ```rust
//! use molgen_data::tensor::Tensor;
//!
//! // Three atoms in 3D space
//! let pos = Tensor::<f32, 2>::new(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], [3, 3]).unwrap();
//! assert_eq!(pos.shape(), &[3, 3]);
//! assert_eq!(pos.strides(), &[3, 1]);
//! ```
//!
//! > [!TIP]
//! > Layout is **Row-Major** (C-style): the last dimension changes fastest in memory. A node
//! > feature matrix `[N, F]` therefore stores one node per contiguous row, which is what the
//! > batching code relies on when it concatenates samples along the node axis.

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod device;
pub mod ops;

pub use device::Device;

/// Error type for Tensor operations.
#[derive(Error, Debug)]
pub enum TensorError {
    /// The shape of the data does not match the expected shape.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// An index is out of bounds for the given shape.
    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },
    /// The requested operation is not supported (e.g., a device without a backend).
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<molgen_data_kernels::KernelError> for TensorError {
    fn from(e: molgen_data_kernels::KernelError) -> Self {
        match e {
            molgen_data_kernels::KernelError::ShapeMismatch { expected, got } => {
                TensorError::ShapeMismatch { expected, got }
            }
            molgen_data_kernels::KernelError::OutOfRange { n, max } => {
                TensorError::IndexOutOfBounds {
                    index: vec![n],
                    shape: vec![max],
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Trait bound for elements that can be stored in a Tensor.
///
/// Covers both the `f32` feature tensors and the `i64` index tensors.
pub trait TensorElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> TensorElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}

/// An N-dimensional array.
///
/// # Generics
///
/// - `T`: The element type (must implement `TensorElem`).
/// - `RANK`: The number of dimensions (const generic).
///
/// The rank lives in the type, the sizes do not: node counts differ from molecule to
/// molecule, so `[N, 3]` positions are all `Tensor<f32, 2>` regardless of `N`.
#[derive(Clone, PartialEq)]
pub struct Tensor<T, const RANK: usize>
where
    T: TensorElem,
{
    shape: [usize; RANK],
    strides: [usize; RANK],
    data: Vec<T>,
    device: Device,
}

impl<T, const RANK: usize> Tensor<T, RANK>
where
    T: TensorElem,
{
    /// Creates a new Tensor from a vector of data and a shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the length of `data` does not match the product of `shape`.
    pub fn new(data: Vec<T>, shape: [usize; RANK]) -> Result<Self> {
        let size: usize = shape.iter().product();
        if data.len() != size {
            return Err(TensorError::ShapeMismatch {
                expected: vec![size],
                got: vec![data.len()],
            });
        }

        let strides = compute_strides(&shape);
        Ok(Self {
            shape,
            strides,
            data,
            device: Device::Cpu,
        })
    }

    /// Creates a new Tensor filled with zeros.
    pub fn zeros(shape: [usize; RANK]) -> Self {
        Self::from_fn(shape, |_| T::zero())
    }

    /// Creates a Tensor by calling `f` with the flat (row-major) index of every element.
    pub fn from_fn<F>(shape: [usize; RANK], mut f: F) -> Self
    where
        F: FnMut(usize) -> T,
    {
        let size: usize = shape.iter().product();
        Self {
            shape,
            strides: compute_strides(&shape),
            data: (0..size).map(&mut f).collect(),
            device: Device::Cpu,
        }
    }

    /// Returns the shape of the tensor.
    pub const fn shape(&self) -> &[usize; RANK] {
        &self.shape
    }

    /// Returns the strides of the tensor.
    pub const fn strides(&self) -> &[usize; RANK] {
        &self.strides
    }

    /// Returns the device the tensor is placed on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Returns a reference to the underlying data as a slice.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns a mutable reference to the underlying data as a slice.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the tensor and returns the flat data.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Returns the total number of elements in the tensor.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Moves the tensor to `device`.
    ///
    /// # Errors
    ///
    /// Only host memory is backed; any other target returns `TensorError::Unsupported`.
    pub fn to_device(self, device: &Device) -> Result<Self> {
        match device {
            Device::Cpu => Ok(self),
            other => Err(TensorError::Unsupported(format!(
                "no backend for device {}",
                other
            ))),
        }
    }
}

/// Computes row-major strides for a shape.
const fn compute_strides<const RANK: usize>(shape: &[usize; RANK]) -> [usize; RANK] {
    let mut strides = [0; RANK];
    let mut stride = 1;
    let mut i = RANK;
    while i > 0 {
        i -= 1;
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

impl<T, const RANK: usize> Debug for Tensor<T, RANK>
where
    T: TensorElem,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("device", &self.device.name())
            .field("data_len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_creation() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let tensor = Tensor::<f32, 2>::new(data.clone(), [2, 2]).unwrap();
        assert_eq!(tensor.shape(), &[2, 2]);
        assert_eq!(tensor.data(), &data[..]);

        let err = Tensor::<f32, 2>::new(vec![1.0, 2.0, 3.0], [2, 2]);
        assert!(matches!(err, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zero_sized() {
        let t = Tensor::<f32, 2>::zeros([0, 3]);
        assert_eq!(t.size(), 0);
        assert!(t.data().is_empty());
        assert_eq!(t.shape(), &[0, 3]);
    }

    #[test]
    fn test_zeros_from_fn() {
        let zeros = Tensor::<f32, 2>::zeros([2, 3]);
        assert_eq!(zeros.data(), &[0.0; 6]);

        let ramp = Tensor::<i64, 2>::from_fn([2, 2], |i| i as i64);
        assert_eq!(ramp.data(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_to_device() {
        let t = Tensor::<f32, 1>::new(vec![1.0, 2.0], [2]).unwrap();
        let t = t.to_device(&Device::Cpu).unwrap();
        assert_eq!(t.device(), &Device::Cpu);

        let err = t.to_device(&Device::Cuda(0));
        assert!(matches!(err, Err(TensorError::Unsupported(_))));
    }

    #[test]
    fn test_compute_strides() {
        let strides = compute_strides(&[2, 3, 4]);
        assert_eq!(strides, [12, 4, 1]);
    }

    #[test]
    fn test_tensor_error_display() {
        let err = TensorError::ShapeMismatch {
            expected: vec![2, 2],
            got: vec![4],
        };
        assert_eq!(
            format!("{}", err),
            "Shape mismatch: expected [2, 2], got [4]"
        );

        let err = TensorError::Unsupported("foo".to_string());
        assert_eq!(format!("{}", err), "Unsupported operation: foo");
    }

    #[test]
    fn test_kernel_error_conversion() {
        let err: TensorError = molgen_data_kernels::KernelError::OutOfRange { n: 5, max: 3 }.into();
        assert!(matches!(err, TensorError::IndexOutOfBounds { .. }));
    }

    #[test]
    fn test_tensor_debug() {
        let t = Tensor::<f32, 1>::new(vec![1.0], [1]).unwrap();
        let debug_str = format!("{:?}", t);
        assert!(debug_str.contains("Tensor"));
        assert!(debug_str.contains("shape"));
        assert!(debug_str.contains("CPU"));
    }
}
