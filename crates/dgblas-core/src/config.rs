//! Execution configuration
//!
//! Configuration is a plain value threaded through engine construction; the
//! library keeps no global state. It round-trips through JSON so that a
//! driver program can load it from a file.

use crate::error::{Error, Result};
use crate::execution::ExecutionStrategy;
use serde::{Deserialize, Serialize};

/// Elements per chunk handed to one worker
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Elements per device block (256 work items of 8 lanes)
pub const DEFAULT_DEVICE_BLOCK_SIZE: usize = 256 * 8;

/// Settings for engine construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Sequential or parallel
    pub strategy: ExecutionStrategy,
    /// Worker threads; `None` uses one per logical CPU
    pub num_threads: Option<usize>,
    /// Elements per worker chunk
    pub chunk_size: usize,
    /// Elements per device block
    pub device_block_size: usize,
}

// Parallel whenever the rayon engine is compiled in.
fn default_strategy() -> ExecutionStrategy {
    if cfg!(feature = "parallel") {
        ExecutionStrategy::Parallel
    } else {
        ExecutionStrategy::Sequential
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            num_threads: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            device_block_size: DEFAULT_DEVICE_BLOCK_SIZE,
        }
    }
}

impl ExecutionConfig {
    /// Configuration for single-threaded execution
    pub fn sequential() -> Self {
        Self {
            strategy: ExecutionStrategy::Sequential,
            num_threads: Some(1),
            ..Self::default()
        }
    }

    /// Configuration for the rayon engine with one worker per logical CPU
    pub fn parallel() -> Self {
        Self {
            strategy: ExecutionStrategy::Parallel,
            num_threads: None,
            ..Self::default()
        }
    }

    /// Set the number of worker threads
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set the worker chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the device block size
    pub fn with_device_block_size(mut self, block_size: usize) -> Self {
        self.device_block_size = block_size;
        self
    }

    /// Thread count after applying the default
    pub fn effective_threads(&self) -> usize {
        match self.strategy {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel => self.num_threads.unwrap_or_else(num_cpus::get),
        }
    }

    /// Reject zero sizes
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(Error::InvalidParameter(
                "num_threads must be positive".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidParameter(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.device_block_size == 0 {
            return Err(Error::InvalidParameter(
                "device_block_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutionConfig::default();
        #[cfg(feature = "parallel")]
        assert_eq!(config.strategy, ExecutionStrategy::Parallel);
        #[cfg(not(feature = "parallel"))]
        assert_eq!(config.strategy, ExecutionStrategy::Sequential);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.device_block_size, 2048);
        assert!(config.effective_threads() >= 1);
        assert!(config.validate().is_ok());
        assert_eq!(ExecutionConfig::sequential().effective_threads(), 1);
    }

    #[test]
    fn test_effective_threads() {
        assert_eq!(ExecutionConfig::parallel().effective_threads(), num_cpus::get());
        assert_eq!(
            ExecutionConfig::parallel().with_num_threads(5).effective_threads(),
            5
        );
        // sequential ignores an explicit thread count
        let config = ExecutionConfig {
            num_threads: Some(8),
            ..ExecutionConfig::sequential()
        };
        assert_eq!(config.effective_threads(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ExecutionConfig::default()
            .with_num_threads(3)
            .with_chunk_size(128);
        let json = config.to_json_string().unwrap();
        let parsed = ExecutionConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed = ExecutionConfig::from_json_str(r#"{"strategy": "Parallel"}"#).unwrap();
        assert_eq!(parsed.strategy, ExecutionStrategy::Parallel);
        assert_eq!(parsed.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(parsed.num_threads, None);
    }

    #[test]
    fn test_validation() {
        let err = ExecutionConfig::from_json_str(r#"{"chunk_size": 0}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));

        let err = ExecutionConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(ExecutionConfig::default()
            .with_num_threads(0)
            .validate()
            .is_err());
        assert!(ExecutionConfig::default()
            .with_device_block_size(0)
            .validate()
            .is_err());
    }
}
