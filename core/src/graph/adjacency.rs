//! Dense (fully connected, self-loop free) adjacency indexing.
//!
//! # Build once, slice per sample
//!
//! A message-passing model over a molecule with `n` atoms wants every ordered pair
//! `(i, j)` with `i != j` as an edge. Rebuilding that list for every sample is wasteful, so
//! [`DenseAdjacency::build`] materializes the index grid once for the largest graph the
//! dataset can produce, and [`DenseAdjacency::slice`] derives a sample's edges from the
//! top-left `n x n` block of that grid.
//!
//! ```text
//!   rows plane        cols plane        diagonal mask
//!   0 0 0 0           0 1 2 3           T . . .
//!   1 1 1 1           0 1 2 3           . T . .
//!   2 2 2 2           0 1 2 3           . . T .
//!   3 3 3 3           0 1 2 3           . . . T
//! ```
//!
//! Slicing `n = 3` keeps the 3x3 block, flattens it in raster order and drops masked cells:
//!
//! ```rust
//! use molgen_data::graph::DenseAdjacency;
//!
//! let adjacency = DenseAdjacency::build(4).unwrap();
//! let edges = adjacency.slice(3).unwrap();
//! let pairs: Vec<_> = edges.pairs().collect();
//! assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)]);
//! ```
//!
//! The tables are immutable after construction, so a single `DenseAdjacency` can be shared
//! (e.g. behind an `Arc`) by any number of transform workers.

use super::{GraphError, Result};
use crate::tensor::Tensor;

/// The `[2, max_n_nodes, max_n_nodes]` grid of `(row, col)` coordinates.
///
/// Plane 0 varies the first coordinate across rows, plane 1 varies the second across
/// columns.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalIndexTable {
    table: Tensor<i64, 3>,
}

impl GlobalIndexTable {
    /// Side length of the grid.
    pub fn size(&self) -> usize {
        self.table.shape()[1]
    }

    /// The underlying `[2, M, M]` tensor.
    pub fn tensor(&self) -> &Tensor<i64, 3> {
        &self.table
    }

    /// The `(row, col)` coordinates stored at cell `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> Option<(i64, i64)> {
        let m = self.size();
        if i >= m || j >= m {
            return None;
        }
        let data = self.table.data();
        let k = i * m + j;
        Some((data[k], data[m * m + k]))
    }
}

/// A boolean `[max_n_nodes, max_n_nodes]` mask, true exactly on the diagonal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagonalMask {
    size: usize,
    mask: Vec<bool>,
}

impl DiagonalMask {
    /// Side length of the mask.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row-major mask values.
    pub fn as_slice(&self) -> &[bool] {
        &self.mask
    }

    /// Whether cell `(i, j)` is masked. Cells outside the mask are reported as unmasked.
    pub fn is_masked(&self, i: usize, j: usize) -> bool {
        i < self.size && j < self.size && self.mask[i * self.size + j]
    }
}

/// An edge list stored as a `[2, E]` tensor: row 0 holds sources, row 1 targets.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeIndex {
    index: Tensor<i64, 2>,
}

impl EdgeIndex {
    /// Wraps a `[2, E]` tensor.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::InvalidEdgeIndex` if the leading dimension is not 2.
    pub fn from_tensor(index: Tensor<i64, 2>) -> Result<Self> {
        if index.shape()[0] != 2 {
            return Err(GraphError::InvalidEdgeIndex(index.shape().to_vec()));
        }
        Ok(Self { index })
    }

    /// An edge list with no edges.
    pub fn empty() -> Self {
        Self {
            index: Tensor::zeros([2, 0]),
        }
    }

    /// Number of edges `E`.
    pub fn num_edges(&self) -> usize {
        self.index.shape()[1]
    }

    /// Source node of every edge.
    pub fn sources(&self) -> &[i64] {
        &self.index.data()[..self.num_edges()]
    }

    /// Target node of every edge.
    pub fn targets(&self) -> &[i64] {
        &self.index.data()[self.num_edges()..]
    }

    /// Iterates over `(source, target)` pairs in storage order.
    pub fn pairs(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.sources()
            .iter()
            .copied()
            .zip(self.targets().iter().copied())
    }

    /// Returns a copy with every node id shifted by `offset`.
    pub fn offset(&self, offset: i64) -> Self {
        Self {
            index: self.index.map(|v| v + offset),
        }
    }

    /// Concatenates edge lists along the edge axis, keeping node ids as they are.
    pub fn concat(parts: &[EdgeIndex]) -> Self {
        let total: usize = parts.iter().map(EdgeIndex::num_edges).sum();
        let mut data = Vec::with_capacity(2 * total);
        for part in parts {
            data.extend_from_slice(part.sources());
        }
        for part in parts {
            data.extend_from_slice(part.targets());
        }
        Self {
            index: Tensor::from_fn([2, total], |i| data[i]),
        }
    }

    /// The underlying `[2, E]` tensor.
    pub fn tensor(&self) -> &Tensor<i64, 2> {
        &self.index
    }

    /// Consumes the edge list and returns the `[2, E]` tensor.
    pub fn into_tensor(self) -> Tensor<i64, 2> {
        self.index
    }
}

/// Precomputed dense adjacency tables for graphs of up to `max_n_nodes` nodes.
#[derive(Clone, Debug)]
pub struct DenseAdjacency {
    table: GlobalIndexTable,
    diagonal: DiagonalMask,
}

impl DenseAdjacency {
    /// Builds the index grid and diagonal mask for `max_n_nodes`.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::EmptyTable` if `max_n_nodes` is zero.
    pub fn build(max_n_nodes: usize) -> Result<Self> {
        if max_n_nodes == 0 {
            return Err(GraphError::EmptyTable);
        }

        let (table, mask) = molgen_data_kernels::cpu_index_grid(max_n_nodes);
        let table = Tensor::new(table, [2, max_n_nodes, max_n_nodes])?;

        tracing::debug!(max_n_nodes, "built dense adjacency table");

        Ok(Self {
            table: GlobalIndexTable { table },
            diagonal: DiagonalMask {
                size: max_n_nodes,
                mask,
            },
        })
    }

    /// Largest node count this table can slice.
    pub fn max_n_nodes(&self) -> usize {
        self.diagonal.size
    }

    pub fn table(&self) -> &GlobalIndexTable {
        &self.table
    }

    pub fn diagonal(&self) -> &DiagonalMask {
        &self.diagonal
    }

    /// Returns the `n * (n - 1)` off-diagonal pairs of the top-left `n x n` block.
    ///
    /// Pairs come in raster order: for each row, every other column in increasing order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeCountExceeded` if `n > max_n_nodes`.
    pub fn slice(&self, n: usize) -> Result<EdgeIndex> {
        let max = self.max_n_nodes();
        if n > max {
            return Err(GraphError::NodeCountExceeded { n, max });
        }

        let pairs = molgen_data_kernels::cpu_masked_pairs(
            self.table.table.data(),
            self.diagonal.as_slice(),
            max,
            n,
        )?;
        let num_edges = pairs.len() / 2;
        EdgeIndex::from_tensor(Tensor::new(pairs, [2, num_edges])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tables() {
        let adjacency = DenseAdjacency::build(3).unwrap();
        assert_eq!(adjacency.max_n_nodes(), 3);
        assert_eq!(adjacency.table().tensor().shape(), &[2, 3, 3]);
        assert_eq!(adjacency.table().get(2, 1), Some((2, 1)));
        assert_eq!(adjacency.table().get(3, 0), None);

        let diag = adjacency.diagonal();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(diag.is_masked(i, j), i == j);
            }
        }
    }

    #[test]
    fn test_build_empty_rejected() {
        assert!(matches!(
            DenseAdjacency::build(0),
            Err(GraphError::EmptyTable)
        ));
    }

    #[test]
    fn test_slice_three_of_four() {
        let adjacency = DenseAdjacency::build(4).unwrap();
        let edges = adjacency.slice(3).unwrap();
        assert_eq!(edges.num_edges(), 6);
        assert_eq!(edges.sources(), &[0, 0, 1, 1, 2, 2]);
        assert_eq!(edges.targets(), &[1, 2, 0, 2, 0, 1]);
    }

    #[test]
    fn test_slice_degenerate() {
        let adjacency = DenseAdjacency::build(4).unwrap();
        assert_eq!(adjacency.slice(1).unwrap().num_edges(), 0);
        assert_eq!(adjacency.slice(0).unwrap().num_edges(), 0);
        assert_eq!(adjacency.slice(0).unwrap(), EdgeIndex::empty());
    }

    #[test]
    fn test_slice_full_table() {
        let adjacency = DenseAdjacency::build(6).unwrap();
        let edges = adjacency.slice(6).unwrap();
        assert_eq!(edges.num_edges(), 30);
        assert!(edges.pairs().all(|(r, c)| r != c));
    }

    #[test]
    fn test_slice_exceeds_table() {
        let adjacency = DenseAdjacency::build(4).unwrap();
        let err = adjacency.slice(5);
        assert!(matches!(
            err,
            Err(GraphError::NodeCountExceeded { n: 5, max: 4 })
        ));
    }

    #[test]
    fn test_edge_index_offset_and_concat() {
        let adjacency = DenseAdjacency::build(3).unwrap();
        let a = adjacency.slice(2).unwrap();
        let b = adjacency.slice(2).unwrap().offset(2);
        assert_eq!(b.sources(), &[2, 3]);
        assert_eq!(b.targets(), &[3, 2]);

        let both = EdgeIndex::concat(&[a, b]);
        assert_eq!(both.num_edges(), 4);
        let pairs: Vec<_> = both.pairs().collect();
        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 3), (3, 2)]);
    }

    #[test]
    fn test_edge_index_from_tensor() {
        let bad = Tensor::<i64, 2>::zeros([3, 2]);
        assert!(matches!(
            EdgeIndex::from_tensor(bad),
            Err(GraphError::InvalidEdgeIndex(_))
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DenseAdjacency>();

        let adjacency = std::sync::Arc::new(DenseAdjacency::build(8).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let adjacency = adjacency.clone();
                std::thread::spawn(move || adjacency.slice(n + 4).unwrap().num_edges())
            })
            .collect();
        let counts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(counts, vec![12, 20, 30, 42]);
    }
}
