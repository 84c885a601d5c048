// src/error.rs

//! Error types for the upgrade store

use crate::hash::HashError;
use std::io;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by store operations
///
/// Write and import failures never change what is visible in the store,
/// so every variant is recoverable by retrying the operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Directory or file access failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Received content does not match the declared hash
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// No stored package has the requested hash
    #[error("package not found: {0}")]
    NotFound(String),

    /// Malformed version, name, or package
    #[error("validation failed: {0}")]
    Validation(String),

    /// A different package already occupies the destination name
    #[error("package already exists: {0}")]
    AlreadyExists(String),

    /// The byte source feeding a write session reported a failure
    #[error("package source failed: {0}")]
    Source(#[source] io::Error),

    /// Sidecar metadata could not be encoded or decoded
    #[error("invalid package metadata: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Create a validation error with a message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a source error from a transport failure message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Source(io::Error::other(msg.into()))
    }

    /// Whether this is a content hash mismatch
    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, Self::HashMismatch { .. })
    }

    /// Whether this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<HashError> for Error {
    fn from(err: HashError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(io::Error::other(err))
    }
}
