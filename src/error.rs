//! Error types for the Bookwise generation coordinator.

use crate::types::{RecordId, Section};
use std::io;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Generation record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Corrupt generation record: {0}")]
    Corrupt(String),

    #[error("Store is locked by another process: {0}")]
    Locked(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl StorageError {
    pub(crate) fn from_sled(err: sled::Error) -> Self {
        StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
    }

    pub(crate) fn from_json(err: serde_json::Error) -> Self {
        StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
    }

    pub(crate) fn from_bincode(err: bincode::Error) -> Self {
        StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
    }
}

/// How a provider transport failure happened. Drives the stored `error_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Upstream,
}

/// LLM client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request never produced a usable response (timeout, 4xx/5xx, connect failure).
    #[error("Provider request failed: {message}")]
    Transport { kind: TransportKind, message: String },

    /// The provider answered but the payload was empty, not JSON, or not an object.
    #[error("Provider returned invalid output: {0}")]
    Output(String),
}

impl ProviderError {
    pub fn timeout(message: impl Into<String>) -> Self {
        ProviderError::Transport {
            kind: TransportKind::Timeout,
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ProviderError::Transport {
            kind: TransportKind::Upstream,
            message: message.into(),
        }
    }
}

/// A provider payload that does not satisfy its section schema.
#[derive(Debug, Clone, Error)]
#[error("{section} output rejected: {reason}")]
pub struct ContentRejected {
    pub section: Section,
    pub reason: String,
}

/// Book metadata resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Book not found: {0}")]
    NotFound(String),

    #[error("Metadata upstream unavailable: {0}")]
    Upstream(String),
}

/// Errors surfaced by `GenerationService::generate`.
///
/// In-progress and previously-failed states are not errors; they are reported
/// through [`crate::generation::GenerationOutcome`].
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Book not found: {0}")]
    NotFound(String),

    #[error("Invalid section: {0}")]
    InvalidSection(String),

    #[error("Invalid generated content: {0}")]
    InvalidOutput(String),

    #[error("Generation upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GenerationError {
    /// Stable machine-readable kind, used by the CLI and in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::NotFound(_) => "not_found",
            GenerationError::InvalidSection(_) => "invalid_section",
            GenerationError::InvalidOutput(_) => "invalid_output",
            GenerationError::UpstreamUnavailable(_) => "upstream_unavailable",
            GenerationError::Storage(_) => "storage",
        }
    }
}

/// Application-level errors: configuration, logging setup, CLI wiring.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
