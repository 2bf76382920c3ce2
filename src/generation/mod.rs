//! Section generation
//!
//! [`GenerationService::generate`] is the single entry point. A request is
//! validated, its book resolved, and [`ClaimCoordinator`] consults the record
//! store to serve a cached result, report in-progress or prior failure, or
//! claim the key. Only a claimed record reaches [`GenerationExecutor`], which
//! makes the external call and finalizes the record.

pub mod coordinator;
pub mod decision;
pub mod executor;
pub mod service;

pub use coordinator::{ClaimCoordinator, ClaimOutcome};
pub use decision::{decide, Action, RecordState};
pub use executor::GenerationExecutor;
pub use service::{GenerationService, ServiceSettings};

use crate::error::{GenerationError, StorageError};
use crate::store::{GenerationRecord, GenerationStatus};
use crate::types::{CacheKey, RecordId};
use serde::Serialize;
use serde_json::Value;

/// Codes stored in `error_code` of failed records.
pub mod error_code {
    pub const TIMEOUT: &str = "timeout";
    pub const OPENAI_ERROR: &str = "openai_error";
    pub const SCHEMA_VALIDATION: &str = "schema_validation";
    pub const UNEXPECTED: &str = "unexpected";
    pub const ABANDONED: &str = "abandoned";
}

/// Poll hint returned while another request holds the claim.
pub const DEFAULT_RETRY_AFTER_MS: u64 = 500;

/// Bound on re-reads after a lost conditional write.
pub const DEFAULT_MAX_CLAIM_ATTEMPTS: u32 = 3;

/// Non-error result of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// `stored` is true when the content was already persisted before this
    /// request, false when this request generated it.
    Complete {
        key: CacheKey,
        record_id: RecordId,
        stored: bool,
        attempt_count: u32,
        content: Value,
    },
    /// Another request is generating; poll again after `retry_after_ms`.
    Pending { retry_after_ms: u64 },
    /// The stored attempt failed and will not be retried without `force`.
    Failed { error_code: Option<String> },
}

impl GenerationOutcome {
    /// Outcome for a record that is `complete`.
    pub fn complete(record: GenerationRecord, stored: bool) -> Result<Self, GenerationError> {
        let content = match (record.status, record.content) {
            (GenerationStatus::Complete, Some(content)) => content,
            (status, _) => {
                return Err(StorageError::Corrupt(format!(
                    "record {} is {} without content",
                    record.id,
                    status.as_str()
                ))
                .into())
            }
        };
        Ok(GenerationOutcome::Complete {
            key: record.key,
            record_id: record.id,
            stored,
            attempt_count: record.attempt_count,
            content,
        })
    }

    pub fn status(&self) -> &'static str {
        match self {
            GenerationOutcome::Complete { .. } => "complete",
            GenerationOutcome::Pending { .. } => "pending",
            GenerationOutcome::Failed { .. } => "failed",
        }
    }
}
