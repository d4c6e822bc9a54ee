//! Block-structured device engine
//!
//! Models an accelerator: data lives in a [`DeviceBuffer`] of raw IEEE-754
//! bit patterns, kernels run one fixed-size block at a time and every block
//! produces its own partial result, which the host merges afterwards. The
//! blocks are executed on the calling thread.

use super::{ExecutionEngine, ExecutionStrategy};
use crate::config::{ExecutionConfig, DEFAULT_DEVICE_BLOCK_SIZE};
use crate::error::Result;
use crate::primitives::LaneBackend;
use crate::tags::DeviceTag;
use tracing::debug;

/// Device-resident storage of doubles
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceBuffer {
    bits: Vec<u64>,
}

impl DeviceBuffer {
    pub fn zeros(len: usize) -> Self {
        Self {
            bits: vec![0; len],
        }
    }

    /// Copy host values to the device
    pub fn upload(host: &[f64]) -> Self {
        Self {
            bits: bytemuck::cast_slice::<f64, u64>(host).to_vec(),
        }
    }

    /// Copy device values back to the host
    pub fn download(&self) -> Vec<f64> {
        self.as_f64().to_vec()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Resize, zero-filling new elements
    pub fn resize(&mut self, len: usize) {
        self.bits.resize(len, 0);
    }

    /// Raw bit patterns as stored on the device
    pub fn bits(&self) -> &[u64] {
        &self.bits
    }

    /// View for kernels
    pub fn as_f64(&self) -> &[f64] {
        bytemuck::cast_slice(&self.bits)
    }

    /// Mutable view for kernels
    pub fn as_f64_mut(&mut self) -> &mut [f64] {
        bytemuck::cast_slice_mut(&mut self.bits)
    }
}

/// Engine launching kernels block by block
#[derive(Clone, Copy, Debug)]
pub struct DeviceEngine {
    primitives: LaneBackend,
    block_size: usize,
}

impl DeviceEngine {
    /// Create an engine with the default block size
    pub fn new() -> Result<Self> {
        Self::with_block_size(DEFAULT_DEVICE_BLOCK_SIZE)
    }

    /// Create an engine with a custom block size
    pub fn with_block_size(block_size: usize) -> Result<Self> {
        let config = ExecutionConfig::default().with_device_block_size(block_size);
        Self::from_config(&config)
    }

    /// Create from a validated configuration
    pub fn from_config(config: &ExecutionConfig) -> Result<Self> {
        config.validate()?;
        let primitives = LaneBackend::try_new()?;
        debug!(
            block_size = config.device_block_size,
            "creating device engine"
        );
        Ok(Self {
            primitives,
            block_size: config.device_block_size,
        })
    }

    /// Elements per block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks a kernel over `len` elements launches
    pub fn grid_size(&self, len: usize) -> usize {
        len.div_ceil(self.block_size)
    }
}

impl ExecutionEngine for DeviceEngine {
    type Primitives = LaneBackend;
    type Tag = DeviceTag;

    fn primitives(&self) -> &Self::Primitives {
        &self.primitives
    }

    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        (0..count).map(f).collect()
    }

    fn for_each_chunk_mut<F>(&self, data: &mut [f64], f: F)
    where
        F: Fn(usize, &mut [f64]) + Sync + Send,
    {
        let size = self.block_size;
        for (block, chunk) in data.chunks_mut(size).enumerate() {
            f(block * size, chunk);
        }
    }

    fn chunk_size(&self) -> usize {
        self.block_size
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Sequential
    }

    fn num_threads(&self) -> usize {
        1
    }
}
