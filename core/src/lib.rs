//! # molgen-data
//!
//! `molgen-data` is the data side of a diffusion/flow model for small molecules: it turns
//! molecules into fully connected graphs, pairs every graph with a draw from the prior,
//! and batches graphs into one disconnected graph per step.
//!
//! Everything runs on **CPU**; [`Device`] only records where tensors should live.
//!
//! ## Modules
//!
//! - [`mod@tensor`]: Dense N-dimensional tensors and the few ops the pipeline needs.
//! - [`graph`]: The precomputed dense adjacency table and per-graph edge indices.
//! - [`chem`]: Atom types, molecules and JSON molecule records.
//! - [`prior`]: Noise sampling and the node count histogram.
//! - [`data`]: Datasets, samplers, loaders and batching.
//! - [`config`]: TOML loader configuration.
//!
//! ## Example
//!
//! ```rust
//! use molgen_data::graph::DenseAdjacency;
//!
//! let adjacency = DenseAdjacency::build(4).unwrap();
//! let edges = adjacency.slice(3).unwrap();
//! let pairs: Vec<_> = edges.pairs().collect();
//! assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)]);
//! ```

pub mod chem;
pub mod config;
pub mod data;
pub mod graph;
pub mod prior;
pub mod tensor;

pub use chem::{AtomType, Molecule};
pub use config::LoaderConfig;
pub use data::{EvaluationLoader, GenLoader, GraphBatch, InMemoryDataset};
pub use graph::{DenseAdjacency, EdgeIndex};
pub use prior::NodeHistogram;
pub use tensor::{Device, Tensor, TensorError};
