//! Unified error types for the retire ecosystem
//!
//! This module provides a common error type [`RetireError`] that can represent
//! errors from any part of the system. Domain-specific error types (the
//! normalizer's, the cluster builder's, the analyzer's) are converted to
//! `RetireError` for uniform handling at API boundaries.
//!
//! # Example
//!
//! ```ignore
//! use retire_core::{RetireError, RetireResult};
//!
//! fn process_dataset(path: &str) -> RetireResult<()> {
//!     let plants = load_plants(path)?;
//!     run_pipeline(&plants)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all retire operations.
///
/// This enum provides a common error representation for the retire ecosystem,
/// allowing errors from I/O, parsing, normalization, clustering, and analysis
/// to be handled uniformly.
#[derive(Error, Debug)]
pub enum RetireError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required column or field is missing from the input table
    #[error("Schema error: {0}")]
    Schema(String),

    /// An operation received a zero-row input
    #[error("Empty input: the plant table has no rows")]
    EmptyInput,

    /// Clustering collapsed into one cluster or exploded past the maximum
    #[error("Degenerate clustering: {0}")]
    DegenerateClustering(String),

    /// A raw-table row is not covered by any cluster membership
    #[error("Orphan row: raw row {row} is not a member of any cluster")]
    OrphanRow { row: usize },

    /// Out-of-range or contradictory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using RetireError.
pub type RetireResult<T> = Result<T, RetireError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for RetireError {
    fn from(err: anyhow::Error) -> Self {
        RetireError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for RetireError {
    fn from(s: String) -> Self {
        RetireError::Other(s)
    }
}

impl From<&str> for RetireError {
    fn from(s: &str) -> Self {
        RetireError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for RetireError {
    fn from(err: serde_json::Error) -> Self {
        RetireError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetireError::Schema("column 'ORISPL' missing".into());
        assert!(err.to_string().contains("Schema error"));
        assert!(err.to_string().contains("ORISPL"));
    }

    #[test]
    fn test_orphan_row_display() {
        let err = RetireError::OrphanRow { row: 3 };
        assert!(err.to_string().contains("raw row 3"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let retire_err: RetireError = io_err.into();
        assert!(matches!(retire_err, RetireError::Io(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn example_fn() -> RetireResult<i32> {
            Ok(42)
        }
        assert_eq!(example_fn().unwrap(), 42);
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> RetireResult<()> {
            Err(RetireError::EmptyInput)
        }

        fn outer() -> RetireResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
