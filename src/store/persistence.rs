//! Persistence layer for the Generation Record Store

use crate::error::StorageError;
use crate::store::{
    GenerationRecord, GenerationRecordStore, GenerationStatus, InsertOutcome,
    DEFAULT_ERROR_MESSAGE_LIMIT,
};
use crate::types::{CacheKey, RecordId};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sled::{Db, IVec, Tree};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const TREE_RECORDS: &str = "generation_records";
const TREE_IDS: &str = "generation_ids";

const LOCK_BACKOFF_INITIAL: Duration = Duration::from_millis(25);
const LOCK_BACKOFF_MAX: Duration = Duration::from_millis(400);

/// Sled-based implementation of GenerationRecordStore
///
/// Records live in one tree keyed by the encoded cache key, so uniqueness is a
/// property of the key space itself. A second tree maps record ids back to
/// cache keys. Every mutation of a record is a compare-and-swap against the
/// exact bytes that were read.
#[derive(Clone)]
pub struct SledGenerationStore {
    db: Db,
    records: Tree,
    ids: Tree,
    error_message_limit: usize,
}

impl SledGenerationStore {
    /// Open (or create) a store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::open_with_wait(path, Duration::ZERO)
    }

    /// Open a store, waiting up to `wait` for another process to release it.
    ///
    /// sled holds an exclusive file lock for as long as a database is open,
    /// so processes sharing a store take turns. Returns
    /// [`StorageError::Locked`] once the wait runs out.
    pub fn open_with_wait<P: AsRef<Path>>(path: P, wait: Duration) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let deadline = Instant::now() + wait;
        let mut backoff = LOCK_BACKOFF_INITIAL;
        loop {
            match sled::open(path) {
                Ok(db) => return Self::from_db(db),
                Err(err) if is_lock_contention(&err) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(StorageError::Locked(path.display().to_string()));
                    }
                    debug!(path = %path.display(), ?backoff, "store locked, waiting");
                    thread::sleep(backoff.min(deadline - now));
                    backoff = (backoff * 2).min(LOCK_BACKOFF_MAX);
                }
                Err(err) => return Err(StorageError::from_sled(err)),
            }
        }
    }

    /// Build a store on top of an already opened database
    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        let records = db.open_tree(TREE_RECORDS).map_err(StorageError::from_sled)?;
        let ids = db.open_tree(TREE_IDS).map_err(StorageError::from_sled)?;
        Ok(Self {
            db,
            records,
            ids,
            error_message_limit: DEFAULT_ERROR_MESSAGE_LIMIT,
        })
    }

    pub fn with_error_message_limit(mut self, limit: usize) -> Self {
        self.error_message_limit = limit;
        self
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(StorageError::from_sled)?;
        Ok(())
    }

    fn storage_key_for(&self, id: RecordId) -> Result<Option<IVec>, StorageError> {
        self.ids
            .get(id.to_be_bytes())
            .map_err(StorageError::from_sled)
    }

    /// Unconditional write: re-read and retry until our compare-and-swap lands.
    /// Each retry observes a newer value, so this only loops under contention.
    fn write_terminal<F>(&self, id: RecordId, apply: F) -> Result<GenerationRecord, StorageError>
    where
        F: Fn(&mut GenerationRecord, DateTime<Utc>),
    {
        let storage_key = self
            .storage_key_for(id)?
            .ok_or(StorageError::RecordNotFound(id))?;
        loop {
            let current = self
                .records
                .get(&storage_key)
                .map_err(StorageError::from_sled)?
                .ok_or(StorageError::RecordNotFound(id))?;
            let mut record = decode(&current)?;
            apply(&mut record, Utc::now());
            let value = encode(&record)?;
            let swapped = self
                .records
                .compare_and_swap(&storage_key, Some(&current[..]), Some(value))
                .map_err(StorageError::from_sled)?;
            if swapped.is_ok() {
                return Ok(record);
            }
            debug!(record_id = id.0, "terminal write contended, retrying");
        }
    }
}

impl GenerationRecordStore for SledGenerationStore {
    fn find(&self, key: &CacheKey) -> Result<Option<GenerationRecord>, StorageError> {
        let storage_key = key.encode()?;
        match self
            .records
            .get(storage_key)
            .map_err(StorageError::from_sled)?
        {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn get(&self, id: RecordId) -> Result<Option<GenerationRecord>, StorageError> {
        let Some(storage_key) = self.storage_key_for(id)? else {
            return Ok(None);
        };
        match self
            .records
            .get(storage_key)
            .map_err(StorageError::from_sled)?
        {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn insert_pending(
        &self,
        key: &CacheKey,
        schema_version: &str,
    ) -> Result<InsertOutcome, StorageError> {
        let storage_key = key.encode()?;
        let id = RecordId(self.db.generate_id().map_err(StorageError::from_sled)?);
        let record = GenerationRecord::new_pending(id, key.clone(), schema_version, Utc::now());
        let value = encode(&record)?;

        // The id mapping goes in first so the winner can address its record by
        // id as soon as the insert is visible.
        self.ids
            .insert(id.to_be_bytes(), storage_key.as_slice())
            .map_err(StorageError::from_sled)?;

        let inserted = self
            .records
            .compare_and_swap(&storage_key, None::<&[u8]>, Some(value))
            .map_err(StorageError::from_sled)?;

        match inserted {
            Ok(()) => Ok(InsertOutcome::Inserted(record)),
            Err(_) => {
                self.ids
                    .remove(id.to_be_bytes())
                    .map_err(StorageError::from_sled)?;
                debug!(cache_key = %key, "insert lost uniqueness race");
                Ok(InsertOutcome::Conflict)
            }
        }
    }

    fn claim_for_regeneration(
        &self,
        id: RecordId,
        expected: &[GenerationStatus],
    ) -> Result<bool, StorageError> {
        let Some(storage_key) = self.storage_key_for(id)? else {
            return Ok(false);
        };
        let Some(current) = self
            .records
            .get(&storage_key)
            .map_err(StorageError::from_sled)?
        else {
            return Ok(false);
        };

        let mut record = decode(&current)?;
        if !expected.contains(&record.status) {
            return Ok(false);
        }
        record.begin_attempt(Utc::now());
        let value = encode(&record)?;

        let swapped = self
            .records
            .compare_and_swap(&storage_key, Some(&current[..]), Some(value))
            .map_err(StorageError::from_sled)?;
        Ok(swapped.is_ok())
    }

    fn mark_complete(&self, id: RecordId, content: Value) -> Result<GenerationRecord, StorageError> {
        self.write_terminal(id, |record, now| record.complete(content.clone(), now))
    }

    fn mark_failed(
        &self,
        id: RecordId,
        error_code: &str,
        error_message: &str,
    ) -> Result<GenerationRecord, StorageError> {
        let limit = self.error_message_limit;
        self.write_terminal(id, |record, now| {
            record.fail(error_code, error_message, limit, now)
        })
    }

    fn list_for_book(&self, book_id: &str) -> Result<Vec<GenerationRecord>, StorageError> {
        let prefix = CacheKey::book_prefix(book_id)?;
        let mut records = Vec::new();
        for item in self.records.scan_prefix(prefix) {
            let (_, value) = item.map_err(StorageError::from_sled)?;
            records.push(decode(&value)?);
        }
        records.sort_by_key(|r| (r.key.section.as_str(), r.id));
        Ok(records)
    }
}

fn is_lock_contention(err: &sled::Error) -> bool {
    match err {
        sled::Error::Io(io_err) => {
            io_err.kind() == io::ErrorKind::WouldBlock
                || io_err.to_string().contains("could not acquire lock")
        }
        _ => false,
    }
}

fn encode(record: &GenerationRecord) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(record).map_err(StorageError::from_json)
}

fn decode(raw: &[u8]) -> Result<GenerationRecord, StorageError> {
    serde_json::from_slice(raw).map_err(|e| StorageError::Corrupt(e.to_string()))
}
