//! Small dense operators
//!
//! Row-major storage for the per-cell operators of a discretization. Each
//! row is evaluated left to right.

use crate::traits::{Operator, RowKernel};
use dgblas_core::{DenseTag, Error, Result};

/// Row-major dense matrix
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    symmetric: bool,
}

impl DenseMatrix {
    /// Wrap row-major values
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::size_mismatch(rows * cols, data.len(), "dense matrix storage"));
        }
        let symmetric = rows == cols
            && (0..rows).all(|i| (0..i).all(|j| data[i * cols + j] == data[j * cols + i]));
        Ok(Self {
            rows,
            cols,
            data,
            symmetric,
        })
    }

    /// Build from `f(row, col)`
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let data = (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .map(|(i, j)| f(i, j))
            .collect::<Vec<_>>();
        let symmetric = rows == cols
            && (0..rows).all(|i| (0..i).all(|j| data[i * cols + j] == data[j * cols + i]));
        Self {
            rows,
            cols,
            data,
            symmetric,
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Values of one row
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }
}

impl Operator for DenseMatrix {
    type Tag = DenseTag;

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

impl RowKernel for DenseMatrix {
    #[inline]
    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        self.row(row).iter().zip(x).fold(0.0, |s, (&a, &b)| s + a * b)
    }
}
