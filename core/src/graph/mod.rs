//! Graph connectivity for molecular samples.
//!
//! Molecules are modelled as fully connected graphs without self-loops. See
//! [`DenseAdjacency`] for how the per-sample edge lists are derived.

pub mod adjacency;

pub use adjacency::{DenseAdjacency, DiagonalMask, EdgeIndex, GlobalIndexTable};

use crate::tensor::TensorError;
use thiserror::Error;

/// Error type for graph indexing.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A dense table must cover at least one node.
    #[error("Adjacency table must have at least one node")]
    EmptyTable,
    /// A sample has more nodes than the precomputed table covers.
    #[error("Node count {n} exceeds the adjacency table size {max}")]
    NodeCountExceeded { n: usize, max: usize },
    /// An edge index tensor does not have shape `[2, E]`.
    #[error("Edge index must have shape [2, E], got {0:?}")]
    InvalidEdgeIndex(Vec<usize>),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

impl From<molgen_data_kernels::KernelError> for GraphError {
    fn from(e: molgen_data_kernels::KernelError) -> Self {
        match e {
            molgen_data_kernels::KernelError::OutOfRange { n, max } => {
                GraphError::NodeCountExceeded { n, max }
            }
            other => GraphError::Tensor(other.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
