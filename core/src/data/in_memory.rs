//! Collated in-memory molecule storage.
//!
//! Instead of one allocation per molecule, all molecules are concatenated along the node
//! axis and a `slices` vector records where each one starts:
//!
//! ```text
//! pos:     [ m0 m0 m0 | m1 m1 | m2 m2 m2 m2 ]   (N_total, 3)
//! slices:  [ 0,         3,      5,          9 ]
//! ```
//!
//! The same layout is written to disk as a safetensors file with the tensors `pos`
//! (`F32 [N, 3]`), `x` (`F32 [N, F]`), `charges` (`F32 [N, 1]`), `slices` (`I64 [G + 1]`)
//! and `idx` (`I64 [G]`).

use super::{DataError, Dataset, Result};
use crate::chem::{Molecule, MoleculeRecord, NUM_ATOM_TYPES};
use crate::prior::{self, NodeHistogram};
use crate::tensor::Tensor;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::collections::HashMap;
use std::path::Path;

const FORMAT_TAG: &str = "molgen-data/in-memory-v1";

#[derive(Clone, Debug, PartialEq)]
pub struct InMemoryDataset {
    pos: Tensor<f32, 2>,
    x: Tensor<f32, 2>,
    charges: Tensor<f32, 2>,
    slices: Vec<usize>,
    idx: Vec<usize>,
}

impl InMemoryDataset {
    /// Collates molecules into one dataset.
    ///
    /// Molecules without an index get their position in `molecules`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Tensor` if the molecules disagree on the feature width.
    pub fn from_molecules(molecules: Vec<Molecule>) -> Result<Self> {
        let num_features = molecules
            .first()
            .map(Molecule::num_features)
            .unwrap_or(NUM_ATOM_TYPES);

        let mut slices = Vec::with_capacity(molecules.len() + 1);
        slices.push(0);
        let mut idx = Vec::with_capacity(molecules.len());
        let mut pos = Vec::with_capacity(molecules.len());
        let mut x = Vec::with_capacity(molecules.len());
        let mut charges = Vec::with_capacity(molecules.len());

        for (i, molecule) in molecules.into_iter().enumerate() {
            let last = slices[slices.len() - 1];
            slices.push(last + molecule.num_nodes());
            idx.push(molecule.idx().unwrap_or(i));
            let (p, f, c) = molecule.into_parts();
            pos.push(p);
            x.push(f);
            charges.push(c);
        }

        Ok(Self {
            pos: Tensor::concat_rows(&pos, 3)?,
            x: Tensor::concat_rows(&x, num_features)?,
            charges: Tensor::concat_rows(&charges, 1)?,
            slices,
            idx,
        })
    }

    /// Converts and collates JSON-style records.
    pub fn from_records(records: &[MoleculeRecord]) -> Result<Self> {
        let molecules = records
            .iter()
            .enumerate()
            .map(|(i, r)| Molecule::from_record(r).map(|m| m.with_idx(i)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_molecules(molecules)
    }

    /// Width `F` of the feature matrix.
    pub fn num_features(&self) -> usize {
        self.x.cols()
    }

    /// Total node count over all molecules.
    pub fn total_nodes(&self) -> usize {
        self.pos.rows()
    }

    /// Node count of molecule `i`.
    pub fn num_nodes(&self, i: usize) -> Option<usize> {
        if i + 1 >= self.slices.len() {
            return None;
        }
        Some(self.slices[i + 1] - self.slices[i])
    }

    /// Node count of every molecule, in order.
    pub fn node_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.slices.windows(2).map(|w| w[1] - w[0])
    }

    /// Largest node count in the dataset (0 if empty).
    pub fn max_num_nodes(&self) -> usize {
        self.node_counts().max().unwrap_or(0)
    }

    /// Histogram of the dataset's node counts.
    pub fn node_histogram(&self) -> prior::Result<NodeHistogram> {
        NodeHistogram::from_node_counts(self.node_counts())
    }

    /// Returns molecule `i`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::IndexOutOfRange` if `i >= len`.
    pub fn try_get(&self, i: usize) -> Result<Molecule> {
        let len = Dataset::len(self);
        if i >= len {
            return Err(DataError::IndexOutOfRange { index: i, len });
        }
        Ok(self.molecule_at(i))
    }

    /// Keeps the first `len` molecules.
    pub fn truncate(self, len: usize) -> Self {
        if len >= Dataset::len(&self) {
            return self;
        }
        let end = self.slices[len];
        let rows = |t: &Tensor<f32, 2>| take_rows(t, 0, end);
        Self {
            pos: rows(&self.pos),
            x: rows(&self.x),
            charges: rows(&self.charges),
            slices: self.slices[..=len].to_vec(),
            idx: self.idx[..len].to_vec(),
        }
    }

    fn molecule_at(&self, i: usize) -> Molecule {
        let (start, end) = (self.slices[i], self.slices[i + 1]);
        Molecule::from_parts_unchecked(
            take_rows(&self.pos, start, end),
            take_rows(&self.x, start, end),
            take_rows(&self.charges, start, end),
            Some(self.idx[i]),
        )
    }

    /// Writes the dataset to a safetensors file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let pos = f32_bytes(self.pos.data());
        let x = f32_bytes(self.x.data());
        let charges = f32_bytes(self.charges.data());
        let slices = i64_bytes(self.slices.iter().map(|&s| s as i64));
        let idx = i64_bytes(self.idx.iter().map(|&i| i as i64));

        let views = vec![
            ("pos", TensorView::new(Dtype::F32, self.pos.shape().to_vec(), &pos)?),
            ("x", TensorView::new(Dtype::F32, self.x.shape().to_vec(), &x)?),
            (
                "charges",
                TensorView::new(Dtype::F32, self.charges.shape().to_vec(), &charges)?,
            ),
            (
                "slices",
                TensorView::new(Dtype::I64, vec![self.slices.len()], &slices)?,
            ),
            ("idx", TensorView::new(Dtype::I64, vec![self.idx.len()], &idx)?),
        ];

        let metadata = HashMap::from([("format".to_string(), FORMAT_TAG.to_string())]);
        safetensors::serialize_to_file(views, &Some(metadata), path.as_ref())?;

        tracing::info!(
            path = %path.as_ref().display(),
            graphs = Dataset::len(self),
            nodes = self.total_nodes(),
            "saved in-memory dataset"
        );
        Ok(())
    }

    /// Reads a dataset written by [`InMemoryDataset::save`].
    ///
    /// # Errors
    ///
    /// Returns `DataError::Corrupt` if a tensor is missing, has the wrong dtype, or the
    /// tensors do not describe a consistent layout.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let file = SafeTensors::deserialize(&bytes)?;

        let pos = read_f32(&file, "pos")?;
        let x = read_f32(&file, "x")?;
        let charges = read_f32(&file, "charges")?;
        let slices = to_usize(read_i64(&file, "slices")?, "slices")?;
        let idx = to_usize(read_i64(&file, "idx")?, "idx")?;

        let dataset = Self {
            pos,
            x,
            charges,
            slices,
            idx,
        };
        dataset.check_layout()?;

        tracing::info!(
            path = %path.as_ref().display(),
            graphs = Dataset::len(&dataset),
            nodes = dataset.total_nodes(),
            "loaded in-memory dataset"
        );
        Ok(dataset)
    }

    fn check_layout(&self) -> Result<()> {
        let nodes = self.pos.rows();
        if self.pos.cols() != 3 {
            return Err(corrupt(format!("pos has shape {:?}", self.pos.shape())));
        }
        if self.x.rows() != nodes {
            return Err(corrupt(format!("x has {} rows, expected {}", self.x.rows(), nodes)));
        }
        if self.charges.shape() != &[nodes, 1] {
            return Err(corrupt(format!(
                "charges has shape {:?}",
                self.charges.shape()
            )));
        }
        if self.slices.first() != Some(&0) || self.slices.last() != Some(&nodes) {
            return Err(corrupt("slices must start at 0 and end at the node count".into()));
        }
        if self.slices.windows(2).any(|w| w[0] > w[1]) {
            return Err(corrupt("slices must be non-decreasing".into()));
        }
        if self.idx.len() + 1 != self.slices.len() {
            return Err(corrupt(format!(
                "idx has {} entries for {} graphs",
                self.idx.len(),
                self.slices.len() - 1
            )));
        }
        Ok(())
    }
}

impl Dataset<Molecule> for InMemoryDataset {
    fn len(&self) -> usize {
        self.slices.len().saturating_sub(1)
    }

    fn get(&self, index: usize) -> Molecule {
        self.molecule_at(index)
    }
}

fn take_rows(t: &Tensor<f32, 2>, start: usize, end: usize) -> Tensor<f32, 2> {
    let cols = t.cols();
    let data = &t.data()[start * cols..end * cols];
    Tensor::from_fn([end - start, cols], |k| data[k])
}

fn corrupt(msg: String) -> DataError {
    DataError::Corrupt(msg)
}

fn f32_bytes(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn i64_bytes(data: impl Iterator<Item = i64>) -> Vec<u8> {
    data.flat_map(|v| v.to_le_bytes()).collect()
}

fn view<'a>(file: &'a SafeTensors<'a>, name: &str, dtype: Dtype) -> Result<TensorView<'a>> {
    let view = file
        .tensor(name)
        .map_err(|_| corrupt(format!("missing tensor {:?}", name)))?;
    if view.dtype() != dtype {
        return Err(corrupt(format!(
            "tensor {:?} has dtype {:?}, expected {:?}",
            name,
            view.dtype(),
            dtype
        )));
    }
    Ok(view)
}

fn read_f32(file: &SafeTensors<'_>, name: &str) -> Result<Tensor<f32, 2>> {
    let view = view(file, name, Dtype::F32)?;
    let shape = view.shape();
    if shape.len() != 2 {
        return Err(corrupt(format!("tensor {:?} has rank {}", name, shape.len())));
    }
    let data = view
        .data()
        .chunks_exact(4)
        .map(|c| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(c);
            f32::from_le_bytes(buf)
        })
        .collect();
    Ok(Tensor::new(data, [shape[0], shape[1]])?)
}

fn read_i64(file: &SafeTensors<'_>, name: &str) -> Result<Vec<i64>> {
    let view = view(file, name, Dtype::I64)?;
    if view.shape().len() != 1 {
        return Err(corrupt(format!("tensor {:?} must be 1-D", name)));
    }
    Ok(view
        .data()
        .chunks_exact(8)
        .map(|c| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(c);
            i64::from_le_bytes(buf)
        })
        .collect())
}

fn to_usize(values: Vec<i64>, name: &str) -> Result<Vec<usize>> {
    values
        .into_iter()
        .map(|v| usize::try_from(v).map_err(|_| corrupt(format!("negative entry in {:?}", name))))
        .collect()
}
