//! Constant-coefficient stencil operators on a 1D grid
//!
//! Row `i` applies the centered coefficients to `x[i - h..=i + h]` where
//! `h` is the stencil half width. Columns outside the grid either wrap
//! around or are dropped, depending on the [`Boundary`].

use super::csr::CsrMatrix;
use crate::traits::{Operator, RowKernel};
use dgblas_core::{Error, Result, StencilTag};
use serde::{Deserialize, Serialize};

/// Treatment of columns that fall outside the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// Indices wrap around the grid
    Periodic,
    /// Out-of-grid values are zero
    Dirichlet,
}

/// Stencil operator on `n` grid points
#[derive(Clone, Debug, PartialEq)]
pub struct StencilMatrix {
    n: usize,
    coefficients: Vec<f64>,
    boundary: Boundary,
    symmetric: bool,
}

impl StencilMatrix {
    /// Create a stencil from centered coefficients (odd count)
    pub fn new(n: usize, coefficients: Vec<f64>, boundary: Boundary) -> Result<Self> {
        if coefficients.len() % 2 == 0 {
            return Err(Error::InvalidParameter(format!(
                "stencil needs an odd number of coefficients, got {}",
                coefficients.len()
            )));
        }
        let symmetric = coefficients
            .iter()
            .zip(coefficients.iter().rev())
            .all(|(a, b)| a == b);
        Ok(Self {
            n,
            coefficients,
            boundary,
            symmetric,
        })
    }

    /// Negative second difference `(-1, 2, -1) / h²`
    pub fn laplacian_1d(n: usize, h: f64, boundary: Boundary) -> Result<Self> {
        if !(h.is_finite() && h > 0.0) {
            return Err(Error::InvalidParameter(format!("grid spacing must be positive, got {h}")));
        }
        let s = 1.0 / (h * h);
        Self::new(n, vec![-s, 2.0 * s, -s], boundary)
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    fn half_width(&self) -> usize {
        self.coefficients.len() / 2
    }

    /// Column hit by coefficient `k` in `row`, if inside the operator
    #[inline]
    fn column(&self, row: usize, k: usize) -> Option<usize> {
        let offset = row as isize + k as isize - self.half_width() as isize;
        match self.boundary {
            Boundary::Periodic => Some(offset.rem_euclid(self.n as isize) as usize),
            Boundary::Dirichlet => (0..self.n as isize)
                .contains(&offset)
                .then_some(offset as usize),
        }
    }

    /// Assemble the equivalent sparse matrix
    pub fn to_csr(&self) -> Result<CsrMatrix> {
        let mut triplets = Vec::with_capacity(self.n * self.coefficients.len());
        for row in 0..self.n {
            for (k, &c) in self.coefficients.iter().enumerate() {
                if let Some(col) = self.column(row, k) {
                    triplets.push((row, col, c));
                }
            }
        }
        CsrMatrix::from_triplets(self.n, self.n, &triplets)
    }
}

impl Operator for StencilMatrix {
    type Tag = StencilTag;

    fn rows(&self) -> usize {
        self.n
    }

    fn cols(&self) -> usize {
        self.n
    }

    fn is_symmetric(&self) -> bool {
        self.symmetric
    }
}

impl RowKernel for StencilMatrix {
    #[inline]
    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .filter_map(|(k, &c)| self.column(row, k).map(|j| c * x[j]))
            .fold(0.0, |s, t| s + t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_even_width() {
        assert!(StencilMatrix::new(4, vec![1.0, 1.0], Boundary::Periodic).is_err());
        assert!(StencilMatrix::laplacian_1d(4, 0.0, Boundary::Periodic).is_err());
    }

    #[test]
    fn test_dirichlet_rows() {
        let m = StencilMatrix::laplacian_1d(4, 1.0, Boundary::Dirichlet).unwrap();
        let x = [1.0, 1.0, 1.0, 1.0];
        let y: Vec<f64> = (0..4).map(|i| m.row_dot(i, &x)).collect();
        assert_eq!(y, vec![1.0, 0.0, 0.0, 1.0]);
        assert!(m.is_symmetric());
    }

    #[test]
    fn test_periodic_rows() {
        let m = StencilMatrix::laplacian_1d(4, 1.0, Boundary::Periodic).unwrap();
        let y: Vec<f64> = (0..4).map(|i| m.row_dot(i, &[1.0; 4])).collect();
        assert_eq!(y, vec![0.0; 4]);
        assert_eq!(m.row_dot(0, &[1.0, 0.0, 0.0, 5.0]), -3.0);
    }

    #[test]
    fn test_asymmetric_stencil() {
        let m = StencilMatrix::new(5, vec![-1.0, 1.0, 0.0], Boundary::Periodic).unwrap();
        assert!(!m.is_symmetric());
    }

    #[test]
    fn test_to_csr_matches_stencil() {
        for boundary in [Boundary::Periodic, Boundary::Dirichlet] {
            let m = StencilMatrix::laplacian_1d(6, 0.5, boundary).unwrap();
            let csr = m.to_csr().unwrap();
            assert_eq!(csr.is_symmetric(), m.is_symmetric());
            let x: Vec<f64> = (0..6).map(|i| (i * i) as f64).collect();
            for row in 0..6 {
                assert_eq!(csr.row_dot(row, &x), m.row_dot(row, &x));
            }
        }
    }
}
