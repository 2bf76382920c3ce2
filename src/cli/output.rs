//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, GenerationError};

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Generation(err) => format!("{}: {}", err.kind(), err),
        other => other.to_string(),
    }
}

/// Process exit code per error category.
pub fn exit_code(e: &ApiError) -> i32 {
    match e {
        ApiError::ConfigError(_) => 78,
        ApiError::Generation(GenerationError::NotFound(_)) => 3,
        ApiError::Generation(GenerationError::InvalidSection(_)) => 2,
        ApiError::Generation(GenerationError::InvalidOutput(_)) => 4,
        ApiError::Generation(GenerationError::UpstreamUnavailable(_)) => 5,
        ApiError::ProviderError(_) => 5,
        ApiError::Generation(GenerationError::Storage(_)) | ApiError::StorageError(_) => 6,
    }
}
