//! Device-resident vectors
//!
//! Values stay in a [`DeviceBuffer`]; elementwise kernels and reductions are
//! launched block by block through the [`DeviceEngine`]. Moving data to or
//! from the host goes through `transfer` or the explicit `upload` /
//! `download` helpers.

use crate::traits::{ElementwiseOp, ExactReduce, VResult, Vector};
use dgblas_core::{check_same_len, DeviceBuffer, DeviceEngine, DeviceTag, Error, ExecutionEngine, Superaccumulator};
use tracing::trace;

/// Vector in device memory
#[derive(Clone, Debug)]
pub struct DeviceVector {
    buffer: DeviceBuffer,
    engine: DeviceEngine,
}

impl DeviceVector {
    /// Device vector of `len` zeros
    pub fn zeros(engine: DeviceEngine, len: usize) -> Self {
        Self {
            buffer: DeviceBuffer::zeros(len),
            engine,
        }
    }

    /// Copy host values to a new device vector
    pub fn upload(engine: DeviceEngine, host: &[f64]) -> Self {
        Self {
            buffer: DeviceBuffer::upload(host),
            engine,
        }
    }

    /// Copy the values back to the host
    pub fn download(&self) -> Vec<f64> {
        self.buffer.download()
    }

    pub fn buffer(&self) -> &DeviceBuffer {
        &self.buffer
    }

    pub fn engine(&self) -> &DeviceEngine {
        &self.engine
    }

    /// Resize, zero-filling new elements
    pub fn resize(&mut self, len: usize) {
        self.buffer.resize(len);
    }

    pub(crate) fn replace_buffer(&mut self, buffer: DeviceBuffer) {
        self.buffer = buffer;
    }

    pub(crate) fn device_slice(&self) -> &[f64] {
        self.buffer.as_f64()
    }

    pub(crate) fn device_slice_mut(&mut self) -> &mut [f64] {
        self.buffer.as_f64_mut()
    }

    /// Launch `kernel(offset, block)` over every block of the buffer
    pub(crate) fn launch<F>(&mut self, kernel: F)
    where
        F: Fn(usize, &mut [f64]) + Sync + Send,
    {
        let Self { buffer, engine } = self;
        trace!(
            blocks = engine.grid_size(buffer.len()),
            block_size = engine.block_size(),
            "device kernel launch"
        );
        engine.for_each_chunk_mut(buffer.as_f64_mut(), kernel);
    }
}

impl Vector for DeviceVector {
    type Tag = DeviceTag;
    type Error = Error;

    fn len(&self) -> usize {
        self.buffer.len()
    }
}

impl ElementwiseOp for DeviceVector {
    fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        self.launch(|_, block| {
            for v in block.iter_mut() {
                *v = f(*v);
            }
        });
    }

    fn apply_with<F>(&mut self, x: &Self, f: F) -> VResult<(), Self>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        check_same_len(self.len(), x.len(), "apply_with")?;
        let xs = x.device_slice();
        self.launch(|offset, block| {
            let n = block.len();
            for (v, &a) in block.iter_mut().zip(&xs[offset..offset + n]) {
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
        let (a, b) = (x1.device_slice(), x2.device_slice());
        self.launch(|offset, block| {
            let end = offset + block.len();
            for ((v, &p), &q) in block.iter_mut().zip(&a[offset..end]).zip(&b[offset..end]) {
                *v = f(*v, p, q);
            }
        });
        Ok(())
    }
}

impl ExactReduce for DeviceVector {
    fn dot_superacc(&self, y: &Self) -> VResult<Superaccumulator, Self> {
        check_same_len(self.len(), y.len(), "dot")?;
        Ok(self
            .engine
            .exact_dot_superacc(self.device_slice(), y.device_slice()))
    }

    fn dot3_superacc(&self, y: &Self, z: &Self) -> VResult<Superaccumulator, Self> {
        check_same_len(self.len(), y.len(), "dot3")?;
        check_same_len(self.len(), z.len(), "dot3")?;
        Ok(self
            .engine
            .exact_dot3_superacc(self.device_slice(), y.device_slice(), z.device_slice()))
    }

    fn fast_dot(&self, y: &Self) -> VResult<f64, Self> {
        check_same_len(self.len(), y.len(), "fast_dot")?;
        Ok(self.engine.fast_dot(self.device_slice(), y.device_slice()))
    }

    fn fast_dot3(&self, y: &Self, z: &Self) -> VResult<f64, Self> {
        check_same_len(self.len(), y.len(), "fast_dot3")?;
        check_same_len(self.len(), z.len(), "fast_dot3")?;
        Ok(self
            .engine
            .fast_dot3(self.device_slice(), y.device_slice(), z.device_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DeviceEngine {
        DeviceEngine::with_block_size(4).unwrap()
    }

    #[test]
    fn test_upload_download() {
        let host = vec![1.5, -2.0, 0.1, 1e-310, 7.0];
        let dv = DeviceVector::upload(engine(), &host);
        assert_eq!(dv.len(), 5);
        assert_eq!(dv.download(), host);
        assert_eq!(dv.buffer().bits()[0], 1.5f64.to_bits());
    }

    #[test]
    fn test_block_kernels_cover_every_element() {
        let mut y = DeviceVector::upload(engine(), &(0..10).map(f64::from).collect::<Vec<_>>());
        let x = DeviceVector::upload(engine(), &[1.0; 10]);
        y.apply_with(&x, |v, a| v * 2.0 + a).unwrap();
        let expected: Vec<f64> = (0..10).map(|i| 2.0 * i as f64 + 1.0).collect();
        assert_eq!(y.download(), expected);

        let mut z = DeviceVector::zeros(engine(), 10);
        z.apply_with2(&x, &y, |_, a, b| a - b).unwrap();
        assert_eq!(z.download()[9], -18.0);
    }

    #[test]
    fn test_device_reductions() {
        let x = DeviceVector::upload(engine(), &[1e16, 1.0, -1e16, 0.5, 0.25]);
        let ones = DeviceVector::upload(engine(), &[1.0; 5]);
        assert_eq!(x.dot_superacc(&ones).unwrap().round(), 1.75);
        assert_eq!(x.dot3_superacc(&ones, &ones).unwrap().round(), 1.75);
        assert!(x.dot_superacc(&DeviceVector::zeros(engine(), 2)).is_err());
    }

    #[test]
    fn test_resize() {
        let mut v = DeviceVector::upload(engine(), &[1.0]);
        v.resize(3);
        assert_eq!(v.download(), vec![1.0, 0.0, 0.0]);
        v.fill(2.0);
        assert_eq!(v.download(), vec![2.0; 3]);
    }
}
