//! Compressed sparse row operators
//!
//! Column indices are sorted within each row and duplicates are summed at
//! construction, so every row has one canonical entry order.

use crate::traits::{Operator, RowKernel};
use dgblas_core::{Error, Result, SparseTag};

/// General sparse matrix in CSR format
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
    symmetric: bool,
}

impl CsrMatrix {
    /// Build from `(row, col, value)` triplets; duplicates are summed
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        if let Some(&(i, j, _)) = triplets.iter().find(|&&(i, j, _)| i >= rows || j >= cols) {
            return Err(Error::InvalidInput(format!(
                "entry ({i}, {j}) outside a {rows}x{cols} matrix"
            )));
        }

        let mut sorted = triplets.to_vec();
        sorted.sort_by_key(|&(i, j, _)| (i, j));

        let mut row_offsets = vec![0usize; rows + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for (i, j, v) in sorted {
            if last == Some((i, j)) {
                if let Some(tail) = values.last_mut() {
                    *tail += v;
                }
                continue;
            }
            col_indices.push(j);
            values.push(v);
            row_offsets[i + 1] += 1;
            last = Some((i, j));
        }
        for i in 0..rows {
            row_offsets[i + 1] += row_offsets[i];
        }

        Ok(Self::assemble(rows, cols, row_offsets, col_indices, values))
    }

    /// Wrap raw CSR arrays after validating them
    pub fn new(
        rows: usize,
        cols: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if row_offsets.len() != rows + 1 {
            return Err(Error::size_mismatch(rows + 1, row_offsets.len(), "csr row offsets"));
        }
        if col_indices.len() != values.len() {
            return Err(Error::size_mismatch(col_indices.len(), values.len(), "csr values"));
        }
        if row_offsets[0] != 0 || row_offsets[rows] != values.len() {
            return Err(Error::InvalidInput(
                "csr row offsets must start at 0 and end at nnz".to_string(),
            ));
        }
        for i in 0..rows {
            let (start, end) = (row_offsets[i], row_offsets[i + 1]);
            if start > end {
                return Err(Error::InvalidInput(format!("row {i} has negative length")));
            }
            let row = &col_indices[start..end];
            if row.iter().any(|&j| j >= cols) {
                return Err(Error::InvalidInput(format!("row {i} has a column >= {cols}")));
            }
            if row.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::InvalidInput(format!(
                    "row {i} columns are not strictly increasing"
                )));
            }
        }
        Ok(Self::assemble(rows, cols, row_offsets, col_indices, values))
    }

    pub fn identity(n: usize) -> Self {
        Self::assemble(n, n, (0..=n).collect(), (0..n).collect(), vec![1.0; n])
    }

    fn assemble(
        rows: usize,
        cols: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        let mut m = Self {
            rows,
            cols,
            row_offsets,
            col_indices,
            values,
            symmetric: false,
        };
        m.symmetric = m.check_symmetric();
        m
    }

    fn check_symmetric(&self) -> bool {
        self.rows == self.cols
            && (0..self.rows).all(|i| {
                let (cols, vals) = self.row(i);
                cols.iter().zip(vals).all(|(&j, &v)| self.get(j, i) == v)
            })
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of one row
    pub fn row(&self, row: usize) -> (&[usize], &[f64]) {
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        (&self.col_indices[range.clone()], &self.values[range])
    }

    /// Stored value or zero
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (cols, vals) = self.row(row);
        cols.binary_search(&col).map_or(0.0, |k| vals[k])
    }

    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl Operator for CsrMatrix {
    type Tag = SparseTag;

    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn is_symmetric(&self) -> bool {
        self.symmetric
    }
}

impl RowKernel for CsrMatrix {
    #[inline]
    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        let (cols, vals) = self.row(row);
        cols.iter().zip(vals).fold(0.0, |s, (&j, &v)| s + v * x[j])
    }
}
