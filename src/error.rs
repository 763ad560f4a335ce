//! Error types for loginguard.

use thiserror::Error;

/// Main error type for loginguard operations.
#[derive(Error, Debug)]
pub enum LoginGuardError {
    /// Invalid policy or configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity key that cannot bucket a client
    #[error("Invalid identity key: {0}")]
    InvalidKey(String),

    /// The credential check itself could not be completed
    #[error("Credential verification failed: {0}")]
    Verifier(String),

    /// Malformed input to the replay command
    #[error("Replay error on line {line}: {reason}")]
    Replay { line: usize, reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for loginguard operations.
pub type Result<T> = std::result::Result<T, LoginGuardError>;
