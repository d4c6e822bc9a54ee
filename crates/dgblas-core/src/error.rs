//! Error types for reproducible linear algebra
//!
//! Provides the error type shared by the dgblas crates. Every variant except
//! `NotConverged` describes a contract violation that is detected before any
//! computation starts.

use thiserror::Error;

/// Core error type for dispatch and reduction operations
#[derive(Error, Debug)]
pub enum Error {
    /// Operands of an elementwise or reduction operation differ in length
    #[error("Size mismatch in {context}: expected {expected}, got {actual}")]
    SizeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Operator dimensions do not match the containers it is applied to
    #[error(
        "Dimension mismatch in {operation}: operator is {rows}x{cols}, x has {x_len} entries, y has {y_len}"
    )]
    DimensionMismatch {
        operation: &'static str,
        rows: usize,
        cols: usize,
        x_len: usize,
        y_len: usize,
    },

    /// Block containers with different block structure
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A symmetric routine was handed an unsymmetric operator
    #[error("Operator is not symmetric: {0}")]
    NotSymmetric(String),

    /// Host environment lacks a capability a backend depends on
    #[error("Feature not available: {0}")]
    FeatureNotAvailable(String),

    /// Threading or parallelization error
    #[error("Execution error: {0}")]
    Execution(String),

    /// An iterative consumer did not reach its tolerance
    #[error("Not converged after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },

    /// Malformed configuration document
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error for operands of different length
    pub fn size_mismatch(expected: usize, actual: usize, context: &str) -> Self {
        Self::SizeMismatch {
            context: context.to_string(),
            expected,
            actual,
        }
    }

    /// Create an error for an operator applied to containers of the wrong size
    pub fn dimension_mismatch(
        operation: &'static str,
        rows: usize,
        cols: usize,
        x_len: usize,
        y_len: usize,
    ) -> Self {
        Self::DimensionMismatch {
            operation,
            rows,
            cols,
            x_len,
            y_len,
        }
    }
}

/// Check that two operand lengths agree
#[inline]
pub fn check_same_len(expected: usize, actual: usize, context: &str) -> Result<()> {
    if expected != actual {
        return Err(Error::size_mismatch(expected, actual, context));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::size_mismatch(100, 50, "exact_dot");
        assert_eq!(
            err.to_string(),
            "Size mismatch in exact_dot: expected 100, got 50"
        );

        let err = Error::dimension_mismatch("gemv", 3, 4, 5, 3);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in gemv: operator is 3x4, x has 5 entries, y has 3"
        );

        let err = Error::NotSymmetric("csr 4x4".to_string());
        assert_eq!(err.to_string(), "Operator is not symmetric: csr 4x4");

        let err = Error::NotConverged {
            iterations: 10,
            residual: 1.5e-3,
        };
        assert_eq!(
            err.to_string(),
            "Not converged after 10 iterations (residual 1.5e-3)"
        );
    }

    #[test]
    fn test_check_same_len() {
        assert!(check_same_len(3, 3, "axpby").is_ok());
        match check_same_len(3, 4, "axpby") {
            Err(Error::SizeMismatch {
                context,
                expected,
                actual,
            }) => {
                assert_eq!(context, "axpby");
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("Wrong result: {other:?}"),
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
