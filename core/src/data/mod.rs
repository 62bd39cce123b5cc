//! Data loading and processing utilities.
//!
//! This module provides primitives for loading, sampling, augmenting and batching
//! molecular graphs for training a generative model.
//!
//! # Components
//!
//! - **Dataset**: A trait for accessing individual data items.
//! - **Sampler**: A trait for determining the order of data access.
//! - **DataLoader**: An iterator that batches and collates data from a Dataset.
//! - **InMemoryDataset**: Molecules stored collated along the node axis, persisted as safetensors.
//! - **PriorTransform**: Pairs each molecule with prior noise and its dense edge index.
//! - **GraphBatch**: Several graphs concatenated into one disconnected graph.
//! - **GenLoader** / **EvaluationLoader**: The training and evaluation pipelines.

pub mod batch;
pub mod evaluation;
pub mod gen_loader;
pub mod in_memory;
pub mod loader;
pub mod sampler;
pub mod transform;

pub use batch::{GraphBatch, GraphCollate};
pub use evaluation::{DEFAULT_EVAL_BATCH_SIZE, EvaluationIter, EvaluationLoader};
pub use gen_loader::{GenLoader, GenLoaderIter};
pub use in_memory::InMemoryDataset;
pub use loader::{Collate, DataLoader, DefaultCollate};
pub use sampler::{RandomSampler, Sampler, SeededSampler, SequentialSampler};
pub use transform::{GraphSample, PriorTransform};

use crate::chem::ChemError;
use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::prior::PriorError;
use crate::tensor::TensorError;
use thiserror::Error;

/// Error type for the data pipeline.
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Chem(#[from] ChemError),
    #[error(transparent)]
    Prior(#[from] PriorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),
    /// A dataset file does not have the expected layout.
    #[error("Corrupt dataset file: {0}")]
    Corrupt(String),
    #[error("Index {index} out of range for dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Cannot collate an empty batch")]
    EmptyBatch,
    /// Samples with molecule data and prior-only samples cannot share a batch.
    #[error("Batch mixes samples with and without molecule data")]
    MixedBatch,
}

pub type Result<T> = std::result::Result<T, DataError>;

/// A trait for accessing data items.
///
/// A `Dataset` represents a collection of data items (e.g., molecules) that can be
/// accessed by index.
///
/// # Type Parameters
///
/// * `T`: The type of the data item returned by `get`.
pub trait Dataset<T>: Send + Sync {
    /// Returns the total number of items in the dataset.
    fn len(&self) -> usize;

    /// Returns `true` if the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the item at the given index.
    ///
    /// # Panics
    ///
    /// May panic if `index` is out of bounds.
    fn get(&self, index: usize) -> T;
}

impl<T: Clone + Send + Sync> Dataset<T> for Vec<T> {
    fn len(&self) -> usize {
        self.len()
    }

    fn get(&self, index: usize) -> T {
        self[index].clone()
    }
}
