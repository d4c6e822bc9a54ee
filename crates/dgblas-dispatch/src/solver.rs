//! Preconditioned conjugate gradient
//!
//! Written only against the dispatch traits, so one solver serves every
//! container kind. All inner products are exact, which makes the iterate
//! sequence identical for every engine, block layout and process count.

use crate::blas1::{axpby, dot, norm2};
use crate::traits::{ElementwiseOp, ExactReduce, MatVec, VResult};
use dgblas_core::Error;
use tracing::{debug, instrument};

/// Conjugate gradient for symmetric positive definite operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConjugateGradient {
    max_iterations: usize,
}

impl ConjugateGradient {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Solve `A·x = b` starting from the current `x`
    ///
    /// `precond` applies an approximation of `A⁻¹`. Stops once
    /// `‖r‖ ≤ eps·(‖b‖ + 1)` and returns the number of iterations used;
    /// a start value that already satisfies the criterion returns `0`.
    ///
    /// # Errors
    ///
    /// Any dispatch error of the underlying operations, or
    /// [`Error::NotConverged`] with the final residual norm.
    #[instrument(skip_all, fields(max_iterations = self.max_iterations, eps = eps))]
    pub fn solve<A, P, V>(&self, a: &A, x: &mut V, b: &V, precond: &P, eps: f64) -> VResult<usize, V>
    where
        A: MatVec<V>,
        P: MatVec<V>,
        V: ElementwiseOp + ExactReduce,
    {
        if eps.is_nan() || eps < 0.0 {
            return Err(Error::InvalidParameter(format!("tolerance must be non-negative, got {eps}")).into());
        }
        let tol = eps * (norm2(b)? + 1.0);

        let mut r = b.clone();
        a.gemv_scaled(-1.0, x, 1.0, &mut r)?;
        let mut residual = norm2(&r)?;
        if residual <= tol {
            debug!(residual, "initial guess already converged");
            return Ok(0);
        }

        let mut p = r.clone();
        precond.gemv(&r, &mut p)?;
        let mut z = p.clone();
        let mut ap = p.clone();
        let mut nrmzr = dot(&p, &r)?;

        for iteration in 1..=self.max_iterations {
            a.gemv(&p, &mut ap)?;
            let alpha = nrmzr / dot(&p, &ap)?;
            axpby(alpha, &p, 1.0, x)?;
            axpby(-alpha, &ap, 1.0, &mut r)?;

            residual = norm2(&r)?;
            debug!(iteration, residual, "cg step");
            if residual <= tol {
                return Ok(iteration);
            }

            precond.gemv(&r, &mut z)?;
            let nrmzr_new = dot(&z, &r)?;
            axpby(1.0, &z, nrmzr_new / nrmzr, &mut p)?;
            nrmzr = nrmzr_new;
        }

        Err(Error::NotConverged {
            iterations: self.max_iterations,
            residual,
        }
        .into())
    }
}
