//! Common error types for tempo

use thiserror::Error;

/// Common result type for tempo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across tempo execution contexts
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
