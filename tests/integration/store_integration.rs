//! Integration tests for the Generation Record Store

use bookwise::prompt::SCHEMA_VERSION;
use bookwise::store::{
    GenerationRecordStore, GenerationStatus, InsertOutcome, SledGenerationStore,
    RECLAIMABLE_STATUSES,
};
use bookwise::{CacheKey, Section};
use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

const THREADS: usize = 16;

fn key(book_id: &str, section: Section) -> CacheKey {
    CacheKey::new(book_id, section, "v1", "openai", "gpt-5-mini")
}

fn inserted(outcome: InsertOutcome) -> bookwise::store::GenerationRecord {
    match outcome {
        InsertOutcome::Inserted(record) => record,
        InsertOutcome::Conflict => panic!("expected insert"),
    }
}

/// Records survive closing and reopening the database
#[test]
fn test_records_persist_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store");
    let content = json!({"key_ideas": ["a", "b", "c"]});

    let id = {
        let store = SledGenerationStore::new(&path).unwrap();
        let record = inserted(
            store
                .insert_pending(&key("OL1W", Section::KeyIdeas), SCHEMA_VERSION)
                .unwrap(),
        );
        store.mark_complete(record.id, content.clone()).unwrap();
        store.flush().unwrap();
        record.id
    };

    let store = SledGenerationStore::new(&path).unwrap();
    let record = store
        .find(&key("OL1W", Section::KeyIdeas))
        .unwrap()
        .unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.status, GenerationStatus::Complete);
    assert_eq!(record.content, Some(content));
    assert_eq!(store.get(id).unwrap().unwrap(), record);
}

/// Racing inserts for one key: exactly one creates the record
#[test]
fn test_concurrent_inserts_create_one_record() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SledGenerationStore::new(temp_dir.path()).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store
                    .insert_pending(&key("OL1W", Section::Overview), SCHEMA_VERSION)
                    .unwrap()
            })
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|outcome| matches!(outcome, InsertOutcome::Inserted(_)))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(store.list_for_book("OL1W").unwrap().len(), 1);
}

/// Racing reclaims of one failed record: exactly one succeeds
#[test]
fn test_concurrent_claims_succeed_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SledGenerationStore::new(temp_dir.path()).unwrap());
    let record = inserted(
        store
            .insert_pending(&key("OL1W", Section::Critique), SCHEMA_VERSION)
            .unwrap(),
    );
    store.mark_failed(record.id, "timeout", "timed out").unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store
                    .claim_for_regeneration(record.id, &RECLAIMABLE_STATUSES)
                    .unwrap()
            })
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|claimed| *claimed)
        .count();
    assert_eq!(wins, 1);

    let claimed = store.get(record.id).unwrap().unwrap();
    assert_eq!(claimed.status, GenerationStatus::Pending);
    assert_eq!(claimed.attempt_count, 2);
    assert!(claimed.error_code.is_none());
}

/// A pending record cannot be reclaimed
#[test]
fn test_pending_record_is_not_reclaimable() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledGenerationStore::new(temp_dir.path()).unwrap();
    let record = inserted(
        store
            .insert_pending(&key("OL1W", Section::Chapters), SCHEMA_VERSION)
            .unwrap(),
    );
    assert!(!store
        .claim_for_regeneration(record.id, &RECLAIMABLE_STATUSES)
        .unwrap());
    assert_eq!(store.get(record.id).unwrap().unwrap().attempt_count, 1);
}

/// Listing is scoped to one book even when ids share a prefix
#[test]
fn test_list_for_book_is_scoped() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledGenerationStore::new(temp_dir.path()).unwrap();
    for (book, section) in [
        ("OL1W", Section::Overview),
        ("OL1W", Section::Critique),
        ("OL12W", Section::Overview),
        ("OL2W", Section::KeyIdeas),
    ] {
        inserted(store.insert_pending(&key(book, section), SCHEMA_VERSION).unwrap());
    }

    let records = store.list_for_book("OL1W").unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.book_id() == "OL1W"));
    assert_eq!(store.list_for_book("OL12W").unwrap().len(), 1);
    assert!(store.list_for_book("OL3W").unwrap().is_empty());
}

/// Stored error messages respect the configured limit
#[test]
fn test_error_message_limit() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledGenerationStore::new(temp_dir.path())
        .unwrap()
        .with_error_message_limit(16);
    let record = inserted(
        store
            .insert_pending(&key("OL1W", Section::Overview), SCHEMA_VERSION)
            .unwrap(),
    );
    let failed = store
        .mark_failed(record.id, "openai_error", &"e".repeat(500))
        .unwrap();
    assert_eq!(failed.error_message.unwrap().len(), 16);
}
