//! Host-resident vectors
//!
//! A [`HostVector`] owns its values together with the execution engine that
//! runs every operation on it, so its capability tag is the engine's tag:
//! `SerialTag` for a sequential engine, `SharedMemoryTag` for the rayon
//! engine.

use crate::traits::{ElementwiseOp, ExactReduce, HostAccess, VResult, Vector};
use dgblas_core::{check_same_len, Error, ExecutionEngine, Superaccumulator};
use tracing::trace;

/// Vector in host memory driven by engine `E`
#[derive(Clone, Debug)]
pub struct HostVector<E: ExecutionEngine> {
    data: Vec<f64>,
    engine: E,
}

impl<E: ExecutionEngine> HostVector<E> {
    /// Wrap existing values
    pub fn from_vec(engine: E, data: Vec<f64>) -> Self {
        Self { data, engine }
    }

    /// Vector of `len` zeros
    pub fn zeros(engine: E, len: usize) -> Self {
        Self::from_vec(engine, vec![0.0; len])
    }

    /// Copy values from a slice
    pub fn from_slice(engine: E, data: &[f64]) -> Self {
        Self::from_vec(engine, data.to_vec())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// Resize, zero-filling new elements
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, 0.0);
    }

    /// Same values, different engine
    pub fn with_engine<F: ExecutionEngine>(self, engine: F) -> HostVector<F> {
        HostVector {
            data: self.data,
            engine,
        }
    }

    /// Empty vector sharing this vector's engine
    pub fn empty_like(&self) -> Self {
        Self::from_vec(self.engine.clone(), Vec::new())
    }

    /// Run `f(offset, chunk)` over disjoint chunks through the engine
    pub(crate) fn update_chunks<F>(&mut self, f: F)
    where
        F: Fn(usize, &mut [f64]) + Sync + Send,
    {
        let Self { data, engine } = self;
        engine.for_each_chunk_mut(data, f);
    }
}

impl<E: ExecutionEngine> HostAccess for HostVector<E> {
    fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

impl<E: ExecutionEngine> Vector for HostVector<E> {
    type Tag = E::Tag;
    type Error = Error;

    fn len(&self) -> usize {
        self.data.len()
    }
}

impl<E: ExecutionEngine> ElementwiseOp for HostVector<E> {
    fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let Self { data, engine } = self;
        engine.for_each_chunk_mut(data, |_, chunk| {
            for v in chunk.iter_mut() {
                *v = f(*v);
            }
        });
    }

    fn apply_with<F>(&mut self, x: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        check_same_len(self.len(), x.len(), "apply_with")?;
        trace!(len = x.len(), "host apply_with");
        let xs = x.as_slice();
        let Self { data, engine } = self;
        engine.for_each_chunk_mut(data, |offset, chunk| {
            let xs = &xs[offset..offset + chunk.len()];
            for (v, &a) in chunk.iter_mut().zip(xs) {
                *v = f(*v, a);
            }
        });
        Ok(())
    }

    fn apply_with2<F>(&mut self, x1: &Self, x2: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64, f64) -> f64 + Sync + Send,
    {
        check_same_len(self.len(), x1.len(), "apply_with2")?;
        check_same_len(self.len(), x2.len(), "apply_with2")?;
        trace!(len = x1.len(), "host apply_with2");
        let (a, b) = (x1.as_slice(), x2.as_slice());
        let Self { data, engine } = self;
        engine.for_each_chunk_mut(data, |offset, chunk| {
            let end = offset + chunk.len();
            for ((v, &p), &q) in chunk.iter_mut().zip(&a[offset..end]).zip(&b[offset..end]) {
                *v = f(*v, p, q);
            }
        });
        Ok(())
    }
}

impl<E: ExecutionEngine> ExactReduce for HostVector<E> {
    fn dot_superacc(&self, y: &Self) -> VResult<Superaccumulator, Self> {
        check_same_len(self.len(), y.len(), "dot")?;
        Ok(self.engine.exact_dot_superacc(&self.data, &y.data))
    }

    fn dot3_superacc(&self, y: &Self, z: &Self) -> VResult<Superaccumulator, Self> {
        check_same_len(self.len(), y.len(), "dot3")?;
        check_same_len(self.len(), z.len(), "dot3")?;
        Ok(self.engine.exact_dot3_superacc(&self.data, &y.data, &z.data))
    }

    fn fast_dot(&self, y: &Self) -> VResult<f64, Self> {
        check_same_len(self.len(), y.len(), "fast_dot")?;
        Ok(self.engine.fast_dot(&self.data, &y.data))
    }

    fn fast_dot3(&self, y: &Self, z: &Self) -> VResult<f64, Self> {
        check_same_len(self.len(), y.len(), "fast_dot3")?;
        check_same_len(self.len(), z.len(), "fast_dot3")?;
        Ok(self.engine.fast_dot3(&self.data, &y.data, &z.data))
    }
}
