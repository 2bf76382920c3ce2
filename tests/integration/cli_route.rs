//! CLI route table over scripted collaborators

use super::test_utils::{overview_payload, Behavior, FakeLlm, FakeResolver};
use bookwise::cli::{busy_output, exit_code, map_error, until_interrupted, Commands, RunContext};
use bookwise::config::BookwiseConfig;
use bookwise::error::StorageError;
use bookwise::store::SledGenerationStore;
use bookwise::ApiError;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

fn generate(section: &str, format: &str, metrics: bool) -> Commands {
    Commands::Generate {
        book_id: "OL45804W".to_string(),
        section: section.to_string(),
        force: false,
        format: format.to_string(),
        metrics,
    }
}

#[tokio::test]
async fn test_generate_then_status() {
    let temp_dir = TempDir::new().unwrap();
    let context =
        RunContext::with_config(temp_dir.path().to_path_buf(), BookwiseConfig::default()).unwrap();
    let llm = FakeLlm::responding(overview_payload());
    let service = context.service_with(llm.clone(), Arc::new(FakeResolver));

    let out = context
        .execute_with(&generate("overview", "json", true), Some(&service))
        .await
        .unwrap();
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["result"]["status"], "complete");
    assert_eq!(parsed["result"]["stored"], false);
    assert!(parsed["metrics"]["counters"].is_object());

    let out = context
        .execute_with(&generate("overview", "text", false), Some(&service))
        .await
        .unwrap();
    assert!(out.contains("complete"));
    assert_eq!(llm.calls(), 1);

    let status = context
        .execute(&Commands::Status {
            book_id: "OL45804W".to_string(),
            format: "json".to_string(),
        })
        .await
        .unwrap();
    let records: Value = serde_json::from_str(&status).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["status"], "complete");
}

#[tokio::test]
async fn test_invalid_section_maps_to_usage_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let context =
        RunContext::with_config(temp_dir.path().to_path_buf(), BookwiseConfig::default()).unwrap();
    let service = context.service_with(
        FakeLlm::responding(overview_payload()),
        Arc::new(FakeResolver),
    );

    let err = context
        .execute_with(&generate("summary", "text", false), Some(&service))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Generation(_)));
    assert_eq!(exit_code(&err), 2);
    assert!(map_error(&err).contains("invalid_section"));
}

fn status_json(book_id: &str) -> Commands {
    Commands::Status {
        book_id: book_id.to_string(),
        format: "json".to_string(),
    }
}

#[tokio::test]
async fn test_interrupted_generate_releases_claim() {
    let temp_dir = TempDir::new().unwrap();
    let context =
        RunContext::with_config(temp_dir.path().to_path_buf(), BookwiseConfig::default()).unwrap();
    let llm = FakeLlm::new(Behavior::Hang);
    let service = context.service_with(llm.clone(), Arc::new(FakeResolver));

    let command = generate("overview", "text", false);
    let finished = until_interrupted(
        context.execute_with(&command, Some(&service)),
        llm.wait_started(),
    )
    .await;
    assert!(finished.is_none());
    context.flush().unwrap();

    let status = context.execute(&status_json("OL45804W")).await.unwrap();
    let records: Value = serde_json::from_str(&status).unwrap();
    assert_eq!(records[0]["status"], "failed");
    assert_eq!(records[0]["error_code"], "abandoned");
}

#[tokio::test]
async fn test_store_held_by_another_process() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = BookwiseConfig::default();
    config.storage.lock_wait_ms = 50;
    let store_path = temp_dir.path().join(&config.storage.store_path);
    std::fs::create_dir_all(&store_path).unwrap();
    let _held = SledGenerationStore::new(&store_path).unwrap();

    let err = RunContext::with_config(temp_dir.path().to_path_buf(), config.clone())
        .err()
        .unwrap();
    assert!(matches!(err, ApiError::StorageError(StorageError::Locked(_))));
    assert_eq!(exit_code(&err), 6);

    let out = busy_output(&config, &generate("overview", "json", false), &err)
        .unwrap()
        .unwrap();
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["status"], "pending");
    assert_eq!(parsed["retry_after_ms"], 500);

    assert!(busy_output(&config, &status_json("OL45804W"), &err).is_none());
}
