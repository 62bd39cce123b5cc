//! Batching graphs.
//!
//! A batch of `B` graphs is one big disconnected graph: node tensors are concatenated
//! along the node axis and each graph's edge ids are shifted by the number of nodes that
//! precede it. Two bookkeeping vectors recover the graphs:
//!
//! - `batch[v]`: which graph node `v` belongs to.
//! - `ptr[g]..ptr[g + 1]`: the node range of graph `g`.
//!
//! ```text
//! graph 0 (2 nodes) edges (0,1) (1,0)
//! graph 1 (3 nodes) edges (0,1) (0,2) ...  ->  (2,3) (2,4) ...
//! batch = [0, 0, 1, 1, 1]   ptr = [0, 2, 5]
//! ```

use super::transform::GraphSample;
use super::{Collate, DataError, Result};
use crate::graph::EdgeIndex;
use crate::tensor::Tensor;
use std::ops::Range;

/// A collated batch of [`GraphSample`]s.
///
/// The molecule fields (`x`, `pos`, `charges`) are present only when every sample carried
/// molecule data.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphBatch {
    pub x: Option<Tensor<f32, 2>>,
    pub pos: Option<Tensor<f32, 2>>,
    pub charges: Option<Tensor<f32, 2>>,
    pub zx: Tensor<f32, 2>,
    pub zcharges: Tensor<f32, 2>,
    pub zpos: Tensor<f32, 2>,
    pub edge_index: EdgeIndex,
    pub batch: Tensor<i64, 1>,
    pub ptr: Tensor<i64, 1>,
    /// Dataset index of every graph, when known.
    pub idx: Vec<Option<usize>>,
}

impl GraphBatch {
    /// Collates samples into a batch.
    ///
    /// # Errors
    ///
    /// - `DataError::EmptyBatch` if `samples` is empty.
    /// - `DataError::MixedBatch` if only some samples carry molecule data.
    /// - `DataError::Tensor` if feature widths differ between samples.
    pub fn collate(samples: Vec<GraphSample>) -> Result<Self> {
        let first = samples.first().ok_or(DataError::EmptyBatch)?;
        let with_data = samples.iter().filter(|s| s.data.is_some()).count();
        if with_data != 0 && with_data != samples.len() {
            return Err(DataError::MixedBatch);
        }
        let num_prior_features = first.prior.zx.cols();

        let mut ptr = Vec::with_capacity(samples.len() + 1);
        ptr.push(0i64);
        let mut batch = Vec::new();
        let mut edges = Vec::with_capacity(samples.len());
        let mut idx = Vec::with_capacity(samples.len());

        let mut zx = Vec::with_capacity(samples.len());
        let mut zcharges = Vec::with_capacity(samples.len());
        let mut zpos = Vec::with_capacity(samples.len());
        let mut x = Vec::with_capacity(with_data);
        let mut pos = Vec::with_capacity(with_data);
        let mut charges = Vec::with_capacity(with_data);
        let num_features = first.data.as_ref().map(|m| m.num_features()).unwrap_or(0);

        for (g, sample) in samples.into_iter().enumerate() {
            let offset = ptr[g];
            batch.extend(std::iter::repeat_n(g as i64, sample.num_nodes));
            ptr.push(offset + sample.num_nodes as i64);
            edges.push(sample.edge_index.offset(offset));

            idx.push(sample.data.as_ref().and_then(|m| m.idx()));
            if let Some(molecule) = sample.data {
                let (p, f, c) = molecule.into_parts();
                pos.push(p);
                x.push(f);
                charges.push(c);
            }
            zx.push(sample.prior.zx);
            zcharges.push(sample.prior.zcharges);
            zpos.push(sample.prior.zpos);
        }

        let (x, pos, charges) = if with_data > 0 {
            (
                Some(Tensor::concat_rows(&x, num_features)?),
                Some(Tensor::concat_rows(&pos, 3)?),
                Some(Tensor::concat_rows(&charges, 1)?),
            )
        } else {
            (None, None, None)
        };

        let num_graphs = idx.len();
        let total = batch.len();
        Ok(Self {
            x,
            pos,
            charges,
            zx: Tensor::concat_rows(&zx, num_prior_features)?,
            zcharges: Tensor::concat_rows(&zcharges, 1)?,
            zpos: Tensor::concat_rows(&zpos, 3)?,
            edge_index: EdgeIndex::concat(&edges),
            batch: Tensor::new(batch, [total])?,
            ptr: Tensor::new(ptr, [num_graphs + 1])?,
            idx,
        })
    }

    pub fn num_graphs(&self) -> usize {
        self.ptr.size() - 1
    }

    pub fn num_nodes(&self) -> usize {
        self.batch.size()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.num_edges()
    }

    /// Node range of graph `g` within the batch.
    pub fn graph_nodes(&self, g: usize) -> Option<Range<usize>> {
        if g >= self.num_graphs() {
            return None;
        }
        let ptr = self.ptr.data();
        Some(ptr[g] as usize..ptr[g + 1] as usize)
    }

    /// Whether the batch carries molecule data or prior fields only.
    pub fn has_data(&self) -> bool {
        self.x.is_some()
    }
}

/// Collates [`GraphSample`]s into `Result<GraphBatch>`.
pub struct GraphCollate;

impl Collate<GraphSample> for GraphCollate {
    type Output = Result<GraphBatch>;

    fn collate(batch: Vec<GraphSample>) -> Self::Output {
        GraphBatch::collate(batch)
    }
}
