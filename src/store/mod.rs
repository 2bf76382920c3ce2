//! Generation Record Store
//!
//! Durable table of generation attempts, one record per cache key. All mutual
//! exclusion between concurrent generators comes from the atomic operations of
//! this store: insert-if-absent and compare-and-swap claims.

pub mod persistence;

pub use persistence::SledGenerationStore;

use crate::error::StorageError;
use crate::types::{CacheKey, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored error messages are cut to this many characters.
pub const DEFAULT_ERROR_MESSAGE_LIMIT: usize = 200;

/// Statuses a forced regeneration may reclaim.
pub const RECLAIMABLE_STATUSES: [GenerationStatus; 2] =
    [GenerationStatus::Failed, GenerationStatus::Complete];

/// Lifecycle status of a generation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Complete,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Complete => "complete",
            GenerationStatus::Failed => "failed",
        }
    }
}

/// GenerationRecord: state of the latest generation attempt for one cache key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: RecordId,
    pub key: CacheKey,
    pub schema_version: String,
    pub status: GenerationStatus,
    /// Validated payload; `Some` only while `status == Complete`.
    pub content: Option<Value>,
    /// `Some` only while `status == Failed`.
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub attempt_count: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationRecord {
    /// A freshly created record, already claimed by its creator.
    pub fn new_pending(
        id: RecordId,
        key: CacheKey,
        schema_version: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            key,
            schema_version: schema_version.into(),
            status: GenerationStatus::Pending,
            content: None,
            error_code: None,
            error_message: None,
            attempt_count: 1,
            started_at: now,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.key.book_id
    }

    pub(crate) fn begin_attempt(&mut self, now: DateTime<Utc>) {
        self.status = GenerationStatus::Pending;
        self.content = None;
        self.error_code = None;
        self.error_message = None;
        self.finished_at = None;
        self.started_at = now;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.updated_at = now;
    }

    pub(crate) fn complete(&mut self, content: Value, now: DateTime<Utc>) {
        self.status = GenerationStatus::Complete;
        self.content = Some(content);
        self.error_code = None;
        self.error_message = None;
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    pub(crate) fn fail(
        &mut self,
        error_code: &str,
        error_message: &str,
        message_limit: usize,
        now: DateTime<Utc>,
    ) {
        self.status = GenerationStatus::Failed;
        self.content = None;
        self.error_code = Some(error_code.to_string());
        self.error_message = Some(error_message.chars().take(message_limit).collect());
        self.finished_at = Some(now);
        self.updated_at = now;
    }
}

/// Result of `insert_pending`: either this caller created the record, or a
/// concurrent insert for the same key got there first.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(GenerationRecord),
    Conflict,
}

/// Generation record store interface
pub trait GenerationRecordStore: Send + Sync {
    /// Look up the record for a cache key.
    fn find(&self, key: &CacheKey) -> Result<Option<GenerationRecord>, StorageError>;

    /// Look up a record by id.
    fn get(&self, id: RecordId) -> Result<Option<GenerationRecord>, StorageError>;

    /// Create a `pending` record with `attempt_count = 1` if none exists for `key`.
    fn insert_pending(
        &self,
        key: &CacheKey,
        schema_version: &str,
    ) -> Result<InsertOutcome, StorageError>;

    /// Atomically move a record back to `pending`, only if its status is one of
    /// `expected`. Returns `false` when the record changed underneath the
    /// caller or is not in an expected status.
    fn claim_for_regeneration(
        &self,
        id: RecordId,
        expected: &[GenerationStatus],
    ) -> Result<bool, StorageError>;

    /// Terminal write: `complete` with the validated content.
    fn mark_complete(&self, id: RecordId, content: Value) -> Result<GenerationRecord, StorageError>;

    /// Terminal write: `failed` with a diagnostic code and truncated message.
    fn mark_failed(
        &self,
        id: RecordId,
        error_code: &str,
        error_message: &str,
    ) -> Result<GenerationRecord, StorageError>;

    /// All records for a book, ordered by section then id.
    fn list_for_book(&self, book_id: &str) -> Result<Vec<GenerationRecord>, StorageError>;
}
