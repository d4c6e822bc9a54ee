//! Error types for distributed operations

use crate::comm::GroupId;
use thiserror::Error;

/// Errors raised by collective operations
///
/// Every check that can fail is performed identically on all ranks before
/// any message is sent, so a contract violation is reported everywhere
/// instead of leaving some ranks blocked in a collective.
#[derive(Error, Debug)]
pub enum Error {
    /// Operands live on different process groups
    #[error("Communicator mismatch: group {left} vs group {right}")]
    CommunicatorMismatch { left: GroupId, right: GroupId },

    /// Operands are partitioned differently, or sizes do not add up
    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),

    /// A rank outside the group was addressed
    #[error("Invalid rank {rank} for a group of size {size}")]
    InvalidRank { rank: usize, size: usize },

    /// A peer went away or a message could not be delivered
    #[error("Communication error: {0}")]
    Communication(String),

    /// A received message is malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Error from a local operation
    #[error(transparent)]
    Core(#[from] dgblas_core::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidRank { rank: 4, size: 4 };
        assert_eq!(err.to_string(), "Invalid rank 4 for a group of size 4");

        let core: Error = dgblas_core::Error::size_mismatch(3, 2, "dot").into();
        assert_eq!(core.to_string(), "Size mismatch in dot: expected 3, got 2");

        let (a, b) = (GroupId::new(), GroupId::new());
        let err = Error::CommunicatorMismatch { left: a, right: b };
        assert!(err.to_string().contains(&a.to_string()));
    }
}
