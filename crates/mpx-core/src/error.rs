//! Error types for the MPX analyzer

use thiserror::Error;

/// Analyzer errors
///
/// Only startup and stream-level failures surface here; the per-sample
/// hot path is total and cannot fail.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for analyzer operations
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
