//! Error types for playcore
//!
//! Advisory playback operations (write, seek, rate, EOS) never fail: their
//! problems are reported to the media engine through the error callback.
//! These errors cover construction and configuration only.

use thiserror::Error;

/// Main error type for the playcore engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] playcore_common::Error),

    /// Control thread or its runtime could not be started
    #[error("Control thread error: {0}")]
    ControlThread(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using playcore Error
pub type Result<T> = std::result::Result<T, Error>;
