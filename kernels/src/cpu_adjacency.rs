use crate::{KernelError, Result};
use rayon::prelude::*;

/// CPU construction of the dense index grid.
///
/// Builds the flattened `[2, n, n]` coordinate table and the `[n, n]` diagonal mask.
/// Plane 0 holds the row coordinate of every cell (constant along a row), plane 1 holds
/// the column coordinate (constant along a column). This is the outer-product layout
/// `row[i, j] = i`, `col[i, j] = j`.
///
/// Rows are filled in parallel; each output row is independent.
pub fn cpu_index_grid(n: usize) -> (Vec<i64>, Vec<bool>) {
    let plane = n * n;
    let mut table = vec![0i64; 2 * plane];
    let mut diag = vec![false; plane];

    if n == 0 {
        return (table, diag);
    }

    let (rows, cols) = table.split_at_mut(plane);

    rows.par_chunks_mut(n)
        .zip(cols.par_chunks_mut(n))
        .zip(diag.par_chunks_mut(n))
        .enumerate()
        .for_each(|(i, ((row_out, col_out), diag_out))| {
            row_out.fill(i as i64);
            for (j, c) in col_out.iter_mut().enumerate() {
                *c = j as i64;
            }
            diag_out[i] = true;
        });

    (table, diag)
}

/// Selects the off-diagonal pairs of the top-left `n x n` block of an index grid.
///
/// `table` and `mask` must have the layout produced by [`cpu_index_grid`] for `max_n`.
/// The output is flattened `[2, E]`: the first `E` entries are row indices, the last `E`
/// are column indices, in raster order of the block with masked cells skipped.
pub fn cpu_masked_pairs(table: &[i64], mask: &[bool], max_n: usize, n: usize) -> Result<Vec<i64>> {
    let plane = max_n * max_n;
    if table.len() != 2 * plane {
        return Err(KernelError::ShapeMismatch {
            expected: vec![2, max_n, max_n],
            got: vec![table.len()],
        });
    }
    if mask.len() != plane {
        return Err(KernelError::ShapeMismatch {
            expected: vec![max_n, max_n],
            got: vec![mask.len()],
        });
    }
    if n > max_n {
        return Err(KernelError::OutOfRange { n, max: max_n });
    }

    let (rows, cols) = table.split_at(plane);
    let capacity = n * n.saturating_sub(1);
    let mut out_rows = Vec::with_capacity(capacity);
    let mut out_cols = Vec::with_capacity(capacity);

    for i in 0..n {
        let base = i * max_n;
        for j in 0..n {
            let k = base + j;
            if mask[k] {
                continue;
            }
            out_rows.push(rows[k]);
            out_cols.push(cols[k]);
        }
    }

    out_rows.extend_from_slice(&out_cols);
    Ok(out_rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_grid_layout() {
        let (table, diag) = cpu_index_grid(3);
        // Rows plane
        assert_eq!(&table[..9], &[0, 0, 0, 1, 1, 1, 2, 2, 2]);
        // Cols plane
        assert_eq!(&table[9..], &[0, 1, 2, 0, 1, 2, 0, 1, 2]);
        assert_eq!(
            diag,
            vec![true, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_index_grid_empty() {
        let (table, diag) = cpu_index_grid(0);
        assert!(table.is_empty());
        assert!(diag.is_empty());
    }

    #[test]
    fn test_masked_pairs_block() {
        let (table, diag) = cpu_index_grid(4);
        let pairs = cpu_masked_pairs(&table, &diag, 4, 3).unwrap();
        assert_eq!(pairs, vec![0, 0, 1, 1, 2, 2, 1, 2, 0, 2, 0, 1]);
    }

    #[test]
    fn test_masked_pairs_full_and_trivial() {
        let (table, diag) = cpu_index_grid(5);
        assert_eq!(cpu_masked_pairs(&table, &diag, 5, 5).unwrap().len(), 2 * 20);
        assert!(cpu_masked_pairs(&table, &diag, 5, 1).unwrap().is_empty());
        assert!(cpu_masked_pairs(&table, &diag, 5, 0).unwrap().is_empty());
    }

    #[test]
    fn test_masked_pairs_out_of_range() {
        let (table, diag) = cpu_index_grid(2);
        let err = cpu_masked_pairs(&table, &diag, 2, 3);
        assert!(matches!(err, Err(KernelError::OutOfRange { n: 3, max: 2 })));
    }

    #[test]
    fn test_masked_pairs_bad_layout() {
        let (table, diag) = cpu_index_grid(3);
        let err = cpu_masked_pairs(&table[..10], &diag, 3, 2);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }
}
