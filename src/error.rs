//! Error types for the Granary telemetry service.
//!
//! This module provides a unified error type [`GranaryError`] for all Granary
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Admission**: a tenant exceeded its request budget (`RateLimited`)
//! - **Storage**: the backing store rejected or failed a write
//! - **Auth**: missing or unknown API keys
//! - **Configuration**: invalid settings or missing configuration
//! - **Validation**: malformed input that survived the outer layers
//!
//! # Example
//!
//! ```rust
//! use granary::error::{GranaryError, Result};
//!
//! fn check_batch_size(size: usize) -> Result<()> {
//!     if size == 0 {
//!         return Err(GranaryError::Validation("batch size must be non-zero".into()));
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Main error type for Granary operations.
#[derive(Error, Debug)]
pub enum GranaryError {
    // Admission errors
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    // Auth errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GranaryError {
    /// HTTP status code for the gateway layer.
    pub fn status_code(&self) -> u16 {
        match self {
            GranaryError::RateLimited { .. } => 429,
            GranaryError::Unauthorized(_) => 401,
            GranaryError::Validation(_) => 400,
            GranaryError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// Check if the caller may safely retry the whole operation.
    ///
    /// Storage failures are retryable because ingestion is idempotent:
    /// already-committed rows are re-observed as duplicates on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GranaryError::RateLimited { .. }
                | GranaryError::Storage(_)
                | GranaryError::WriteFailed(_)
        )
    }
}

/// Result type alias for Granary operations.
pub type Result<T> = std::result::Result<T, GranaryError>;
