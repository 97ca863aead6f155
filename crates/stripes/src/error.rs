//! Error types for stripe navigation

use thiserror::Error;

/// Result type for stripe reader operations
pub type Result<T> = std::result::Result<T, StripeError>;

/// Errors that can occur while selecting or reading stripes
#[derive(Error, Debug)]
pub enum StripeError {
    /// Operation called in a reader state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Caller passed an unknown column or a wrongly sized buffer
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Stripe descriptors or footer metadata are malformed
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A predicate needs statistics the metadata does not carry
    #[error("Missing statistics for column {column}")]
    MissingStatistics { column: usize },

    /// Stripe bytes could not be decoded into a column vector
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error with Arrow data structures
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error reading or parsing a Parquet footer
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}

impl From<String> for StripeError {
    fn from(s: String) -> Self {
        StripeError::Generic(s)
    }
}

impl From<&str> for StripeError {
    fn from(s: &str) -> Self {
        StripeError::Generic(s.to_string())
    }
}
