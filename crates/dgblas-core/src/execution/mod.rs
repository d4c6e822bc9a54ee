//! Execution engines for controlling computation strategy
//!
//! An execution engine pairs a reduction backend (scalar vs lanes) with an
//! execution strategy (sequential, rayon workers, device blocks). Containers
//! own the engine that runs their operations, and the engine's `Tag` is the
//! container's capability tag.
//!
//! Exact reductions split their input into chunks, reduce every chunk into
//! its own superaccumulator and merge the partials after the join. Because
//! merging is exact, the result does not depend on the chunk size, the
//! number of workers or the order the chunks finish in.

mod device;

pub use device::{DeviceBuffer, DeviceEngine};

use crate::config::ExecutionConfig;
use crate::primitives::{LaneBackend, ReductionPrimitives, ScalarBackend};
use crate::superacc::Superaccumulator;
use crate::tags::{ContainerTag, SerialTag};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Execution strategy for batch operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    /// Process items sequentially
    Sequential,
    /// Process items in parallel
    Parallel,
}

/// Trait for execution engines that control how computations are performed
///
/// An execution engine combines:
/// - Reduction primitives (scalar vs lanes)
/// - Execution strategy (sequential vs parallel vs device blocks)
/// - The capability tag of containers run by this engine
pub trait ExecutionEngine: Clone + Send + Sync + std::fmt::Debug {
    /// The type of primitives used by this engine
    type Primitives: ReductionPrimitives;

    /// Capability tag of containers driven by this engine
    type Tag: ContainerTag;

    /// Get the primitives for low-level operations
    fn primitives(&self) -> &Self::Primitives;

    /// Execute operations on multiple datasets
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send;

    /// Run `f(offset, chunk)` over disjoint mutable chunks of `data`
    fn for_each_chunk_mut<F>(&self, data: &mut [f64], f: F)
    where
        F: Fn(usize, &mut [f64]) + Sync + Send;

    /// Elements per chunk
    fn chunk_size(&self) -> usize;

    /// Get the execution strategy
    fn strategy(&self) -> ExecutionStrategy;

    /// Get the number of threads available
    fn num_threads(&self) -> usize;

    /// Exact Σ x[i]·y[i] as a superaccumulator (lengths must agree)
    fn exact_dot_superacc(&self, x: &[f64], y: &[f64]) -> Superaccumulator {
        debug_assert_eq!(x.len(), y.len());
        let size = self.chunk_size().max(1);
        let partials = self.execute_batch(x.len().div_ceil(size), |c| {
            let range = chunk_range(c, size, x.len());
            let mut acc = Superaccumulator::new();
            self.primitives()
                .accumulate_dot(&x[range.clone()], &y[range], &mut acc);
            acc
        });
        merge_partials(partials)
    }

    /// Exact Σ x[i]·y[i]·z[i] as a superaccumulator (lengths must agree)
    fn exact_dot3_superacc(&self, x: &[f64], y: &[f64], z: &[f64]) -> Superaccumulator {
        debug_assert_eq!(x.len(), y.len());
        debug_assert_eq!(x.len(), z.len());
        let size = self.chunk_size().max(1);
        let partials = self.execute_batch(x.len().div_ceil(size), |c| {
            let range = chunk_range(c, size, x.len());
            let mut acc = Superaccumulator::new();
            self.primitives().accumulate_dot3(
                &x[range.clone()],
                &y[range.clone()],
                &z[range],
                &mut acc,
            );
            acc
        });
        merge_partials(partials)
    }

    /// Exact Σ x[i] as a superaccumulator
    fn exact_sum_superacc(&self, x: &[f64]) -> Superaccumulator {
        let size = self.chunk_size().max(1);
        let partials = self.execute_batch(x.len().div_ceil(size), |c| {
            let mut acc = Superaccumulator::new();
            self.primitives()
                .accumulate_sum(&x[chunk_range(c, size, x.len())], &mut acc);
            acc
        });
        merge_partials(partials)
    }

    /// Ordinary floating-point dot product
    ///
    /// Chunk partials are added in chunk order, so the result is stable for
    /// a fixed chunk size but not across configurations.
    fn fast_dot(&self, x: &[f64], y: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), y.len());
        let size = self.chunk_size().max(1);
        self.execute_batch(x.len().div_ceil(size), |c| {
            let range = chunk_range(c, size, x.len());
            self.primitives().fast_dot(&x[range.clone()], &y[range])
        })
        .into_iter()
        .sum()
    }

    /// Ordinary floating-point three-operand dot product
    fn fast_dot3(&self, x: &[f64], y: &[f64], z: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), y.len());
        debug_assert_eq!(x.len(), z.len());
        let size = self.chunk_size().max(1);
        self.execute_batch(x.len().div_ceil(size), |c| {
            let range = chunk_range(c, size, x.len());
            self.primitives()
                .fast_dot3(&x[range.clone()], &y[range.clone()], &z[range])
        })
        .into_iter()
        .sum()
    }
}

/// Index range of chunk `index` when `len` elements are cut into `size` pieces
#[inline]
pub fn chunk_range(index: usize, size: usize, len: usize) -> Range<usize> {
    let start = index * size;
    start..(start + size).min(len)
}

/// Merge per-chunk partials into one accumulator
pub fn merge_partials(partials: Vec<Superaccumulator>) -> Superaccumulator {
    let mut iter = partials.into_iter();
    let Some(mut total) = iter.next() else {
        return Superaccumulator::new();
    };
    for partial in iter {
        total.merge(&partial);
    }
    total
}

/// Sequential execution engine
///
/// Executes all operations sequentially in the current thread.
#[derive(Clone, Debug)]
pub struct SequentialEngine<P: ReductionPrimitives> {
    primitives: P,
    chunk_size: usize,
}

impl<P: ReductionPrimitives> SequentialEngine<P> {
    /// Create a new sequential engine with the given primitives
    pub fn new(primitives: P) -> Self {
        Self {
            primitives,
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the chunk size used to cut reductions
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Create from a validated configuration (thread settings are ignored)
    pub fn from_config(primitives: P, config: &ExecutionConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            backend = primitives.backend_name(),
            chunk_size = config.chunk_size,
            "creating sequential engine"
        );
        Ok(Self::new(primitives).with_chunk_size(config.chunk_size))
    }
}

impl<P: ReductionPrimitives + std::fmt::Debug> ExecutionEngine for SequentialEngine<P> {
    type Primitives = P;
    type Tag = SerialTag;

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
        let size = self.chunk_size;
        for (i, chunk) in data.chunks_mut(size).enumerate() {
            f(i * size, chunk);
        }
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Sequential
    }

    fn num_threads(&self) -> usize {
        1
    }
}

/// Parallel execution engine using Rayon
///
/// Executes operations in parallel using Rayon's thread pool.
#[cfg(feature = "parallel")]
#[derive(Clone, Debug)]
pub struct ParallelEngine<P: ReductionPrimitives> {
    primitives: P,
    thread_pool: Option<std::sync::Arc<rayon::ThreadPool>>,
    chunk_size: usize,
}

#[cfg(feature = "parallel")]
impl<P: ReductionPrimitives> ParallelEngine<P> {
    /// Create a new parallel engine with default thread pool
    pub fn new(primitives: P) -> Self {
        Self {
            primitives,
            thread_pool: None,
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create with a specific number of threads
    pub fn with_num_threads(primitives: P, num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| crate::Error::Execution(format!("Failed to create thread pool: {e}")))?;

        Ok(Self {
            primitives,
            thread_pool: Some(std::sync::Arc::new(pool)),
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
        })
    }

    /// Create from a validated configuration
    ///
    /// The pool size is [`ExecutionConfig::effective_threads`].
    pub fn from_config(primitives: P, config: &ExecutionConfig) -> Result<Self> {
        config.validate()?;
        let engine = Self::with_num_threads(primitives, config.effective_threads())?;
        debug!(
            backend = engine.primitives.backend_name(),
            threads = engine.num_threads_inner(),
            chunk_size = config.chunk_size,
            "creating parallel engine"
        );
        Ok(engine.with_chunk_size(config.chunk_size))
    }

    /// Override the chunk size handed to each worker
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.thread_pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn num_threads_inner(&self) -> usize {
        match &self.thread_pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

#[cfg(feature = "parallel")]
impl<P: ReductionPrimitives + std::fmt::Debug> ExecutionEngine for ParallelEngine<P> {
    type Primitives = P;
    type Tag = crate::tags::SharedMemoryTag;

    fn primitives(&self) -> &Self::Primitives {
        &self.primitives
    }

    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        use rayon::prelude::*;

        self.install(|| (0..count).into_par_iter().map(f).collect())
    }

    fn for_each_chunk_mut<F>(&self, data: &mut [f64], f: F)
    where
        F: Fn(usize, &mut [f64]) + Sync + Send,
    {
        use rayon::prelude::*;

        let size = self.chunk_size;
        self.install(|| {
            data.par_chunks_mut(size)
                .enumerate()
                .for_each(|(i, chunk)| f(i * size, chunk))
        })
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Parallel
    }

    fn num_threads(&self) -> usize {
        self.num_threads_inner()
    }
}

/// Consumer of the engine an [`ExecutionConfig`] selects
///
/// Sequential and parallel engines are different types, so the choice made at
/// runtime is handed to a generic callback instead of being returned.
pub trait EngineVisitor<P: ReductionPrimitives> {
    /// Value produced from the engine
    type Output;

    /// Run with the configured engine
    fn visit<E: ExecutionEngine<Primitives = P>>(self, engine: E) -> Self::Output;
}

/// Build the engine named by `config.strategy` and pass it to `visitor`
///
/// `Sequential` builds a [`SequentialEngine`]; `Parallel` builds a
/// `ParallelEngine` with [`ExecutionConfig::effective_threads`] workers and
/// fails with `FeatureNotAvailable` when the `parallel` feature is off.
pub fn with_configured_engine<P, V>(
    primitives: P,
    config: &ExecutionConfig,
    visitor: V,
) -> Result<V::Output>
where
    P: ReductionPrimitives + std::fmt::Debug,
    V: EngineVisitor<P>,
{
    match config.strategy {
        ExecutionStrategy::Sequential => {
            Ok(visitor.visit(SequentialEngine::from_config(primitives, config)?))
        }
        #[cfg(feature = "parallel")]
        ExecutionStrategy::Parallel => {
            Ok(visitor.visit(ParallelEngine::from_config(primitives, config)?))
        }
        #[cfg(not(feature = "parallel"))]
        ExecutionStrategy::Parallel => Err(crate::Error::FeatureNotAvailable(
            "parallel execution requires the `parallel` feature".to_string(),
        )),
    }
}

/// Create a sequential scalar engine (panics if not supported)
pub fn scalar_sequential() -> SequentialEngine<ScalarBackend> {
    SequentialEngine::new(ScalarBackend::new())
}

/// Create a sequential lane engine (panics if not supported)
pub fn lane_sequential() -> SequentialEngine<LaneBackend> {
    SequentialEngine::new(LaneBackend::new())
}

/// Create a parallel scalar engine (panics if not supported)
#[cfg(feature = "parallel")]
pub fn scalar_parallel() -> ParallelEngine<ScalarBackend> {
    ParallelEngine::new(ScalarBackend::new())
}

/// Create a parallel lane engine (panics if not supported)
#[cfg(feature = "parallel")]
pub fn lane_parallel() -> ParallelEngine<LaneBackend> {
    ParallelEngine::new(LaneBackend::new())
}

/// Create an auto-selected engine based on available features
#[cfg(feature = "parallel")]
pub fn auto_engine() -> ParallelEngine<LaneBackend> {
    lane_parallel()
}

/// Create an auto-selected engine based on available features
#[cfg(not(feature = "parallel"))]
pub fn auto_engine() -> SequentialEngine<LaneBackend> {
    lane_sequential()
}
