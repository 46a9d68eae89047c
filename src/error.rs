//! # Error Types
//!
//! This module provides the error types used throughout the castio library.
//! It defines a central error type `CastError` that encapsulates every failure
//! the pipeline, muxers and sinks can report.
//!
//! ## Example Usage
//!
//! ```rust
//! use castio::error::{CastError, Result};
//!
//! fn check_payload(data: &[u8]) -> Result<()> {
//!     if data.is_empty() {
//!         return Err(CastError::InvalidData("empty payload".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Primary error type for the castio library
#[derive(Error, Debug)]
pub enum CastError {
    /// I/O errors that occur during file or network operations
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value was rejected by a validator
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A codec/container combination or operation is not implementable
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The sink transport could not be opened
    #[error("sink open failed: {0}")]
    SinkOpen(String),

    /// A mid-stream sink write failed; usually fatal for the session
    #[error("sink write failed: {0}")]
    SinkWrite(String),

    /// A frame arrived for a mime or PID that is not registered
    #[error("unknown stream: {0}")]
    UnknownStream(String),

    /// A video key frame was written without its required codec headers
    #[error("missing codec config: {0}")]
    MissingCodecConfig(String),

    /// PID space or another bounded allocation ran out
    #[error("exhausted: {0}")]
    Exhausted(String),

    /// The operation requires a configuration that has not been set
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// The operation is not allowed in the pipeline's current state
    #[error("state violation: {0}")]
    StateViolation(String),

    /// Malformed input data detected while parsing or wrapping payloads
    #[error("invalid data: {0}")]
    InvalidData(String),
}

// The pipeline publishes its last error through an observable cell, so the
// error must be clonable; `std::io::Error` is not, hence the manual impl.
impl Clone for CastError {
    fn clone(&self) -> Self {
        match self {
            CastError::Io(e) => CastError::Io(std::io::Error::new(e.kind(), e.to_string())),
            CastError::InvalidConfig(s) => CastError::InvalidConfig(s.clone()),
            CastError::Unsupported(s) => CastError::Unsupported(s.clone()),
            CastError::SinkOpen(s) => CastError::SinkOpen(s.clone()),
            CastError::SinkWrite(s) => CastError::SinkWrite(s.clone()),
            CastError::UnknownStream(s) => CastError::UnknownStream(s.clone()),
            CastError::MissingCodecConfig(s) => CastError::MissingCodecConfig(s.clone()),
            CastError::Exhausted(s) => CastError::Exhausted(s.clone()),
            CastError::NotConfigured(s) => CastError::NotConfigured(s.clone()),
            CastError::StateViolation(s) => CastError::StateViolation(s.clone()),
            CastError::InvalidData(s) => CastError::InvalidData(s.clone()),
        }
    }
}

/// A specialized Result type for castio operations.
///
/// Used throughout the castio library for operations that can produce a
/// `CastError`.
pub type Result<T> = std::result::Result<T, CastError>;
