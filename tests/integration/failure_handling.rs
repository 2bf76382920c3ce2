//! Every claimed record reaches a terminal state

use super::test_utils::{harness, harness_with, Behavior, FakeLlm};
use bookwise::generation::error_code;
use bookwise::store::{GenerationRecordStore, GenerationStatus};
use bookwise::{GenerationError, Section, ServiceSettings};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_cancelled_request_is_recorded_as_abandoned() {
    let h = harness(FakeLlm::new(Behavior::Hang));
    let service = h.service.clone();
    let handle = tokio::spawn(async move { service.generate("OL1W", "critique", false).await });

    h.llm.wait_started().await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    let record = h
        .store
        .find(&h.service.cache_key("OL1W", Section::Critique))
        .unwrap()
        .unwrap();
    assert_eq!(record.status, GenerationStatus::Failed);
    assert_eq!(record.error_code.as_deref(), Some(error_code::ABANDONED));
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn test_panicking_client_is_recorded_as_unexpected() {
    let h = harness(FakeLlm::new(Behavior::Panic));
    let err = h.service.generate("OL1W", "chapters", false).await.unwrap_err();
    assert!(matches!(err, GenerationError::UpstreamUnavailable(_)));

    let record = h
        .store
        .find(&h.service.cache_key("OL1W", Section::Chapters))
        .unwrap()
        .unwrap();
    assert_eq!(record.status, GenerationStatus::Failed);
    assert_eq!(record.error_code.as_deref(), Some(error_code::UNEXPECTED));
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .contains("provider client bug"));
}

#[tokio::test]
async fn test_hanging_client_is_bounded_by_llm_timeout() {
    let settings = ServiceSettings {
        llm_timeout: Some(Duration::from_millis(50)),
        ..ServiceSettings::default()
    };
    let h = harness_with(FakeLlm::new(Behavior::Hang), settings);

    let err = h.service.generate("OL1W", "overview", false).await.unwrap_err();
    assert!(matches!(err, GenerationError::UpstreamUnavailable(_)));

    let record = h
        .store
        .find(&h.service.cache_key("OL1W", Section::Overview))
        .unwrap()
        .unwrap();
    assert_eq!(record.error_code.as_deref(), Some(error_code::TIMEOUT));
}

#[tokio::test]
async fn test_invalid_payload_is_schema_validation_failure() {
    let h = harness(FakeLlm::responding(json!({
        "overview": "Too short",
        "reading_time_minutes": 15
    })));

    let err = h.service.generate("OL1W", "overview", false).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidOutput(_)));

    let record = h
        .store
        .find(&h.service.cache_key("OL1W", Section::Overview))
        .unwrap()
        .unwrap();
    assert_eq!(record.status, GenerationStatus::Failed);
    assert_eq!(record.error_code.as_deref(), Some(error_code::SCHEMA_VALIDATION));
    assert!(record.content.is_none());
    assert_eq!(
        h.metrics.counter(
            "schema.validation_failed",
            &[("section", "overview"), ("status", "failed")]
        ),
        1
    );
}
