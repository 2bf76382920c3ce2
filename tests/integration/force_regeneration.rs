//! Forced regeneration of completed and failed records

use super::test_utils::{harness, overview_payload, Behavior, FakeLlm};
use bookwise::generation::error_code;
use bookwise::store::{GenerationRecordStore, GenerationStatus};
use bookwise::{GenerationOutcome, Section};
use serde_json::json;

#[tokio::test]
async fn test_force_replaces_completed_content() {
    let h = harness(FakeLlm::responding(overview_payload()));
    h.service.generate("OL1W", "overview", false).await.unwrap();
    let key = h.service.cache_key("OL1W", Section::Overview);
    let original = h.store.find(&key).unwrap().unwrap();

    let replacement = json!({
        "overview": "A second, rewritten overview of the same book.",
        "reading_time_minutes": 20
    });
    h.llm
        .set_behavior(Behavior::Respond(replacement.clone(), Default::default()));
    let outcome = h.service.generate("OL1W", "overview", true).await.unwrap();

    match outcome {
        GenerationOutcome::Complete {
            stored,
            attempt_count,
            content,
            record_id,
            ..
        } => {
            assert!(!stored);
            assert_eq!(attempt_count, 2);
            assert_eq!(content, replacement);
            assert_eq!(record_id, original.id);
        }
        other => panic!("expected complete, got {:?}", other),
    }

    let record = h.store.find(&key).unwrap().unwrap();
    assert_eq!(record.content, Some(replacement));
    assert_eq!(record.created_at, original.created_at);
    assert!(record.started_at >= original.started_at);
    assert_eq!(h.store.list_for_book("OL1W").unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_regeneration_keeps_record_failed() {
    let h = harness(FakeLlm::responding(overview_payload()));
    h.service.generate("OL1W", "overview", false).await.unwrap();

    h.llm.set_behavior(Behavior::Upstream);
    assert!(h.service.generate("OL1W", "overview", true).await.is_err());

    let record = h
        .store
        .find(&h.service.cache_key("OL1W", Section::Overview))
        .unwrap()
        .unwrap();
    assert_eq!(record.status, GenerationStatus::Failed);
    assert_eq!(record.error_code.as_deref(), Some(error_code::OPENAI_ERROR));
    assert!(record.content.is_none());
    assert_eq!(record.attempt_count, 2);

    let reported = h.service.generate("OL1W", "overview", false).await.unwrap();
    assert_eq!(
        reported,
        GenerationOutcome::Failed {
            error_code: Some(error_code::OPENAI_ERROR.to_string())
        }
    );
}

#[tokio::test]
async fn test_force_on_absent_key_generates_normally() {
    let h = harness(FakeLlm::responding(overview_payload()));
    let outcome = h.service.generate("OL1W", "overview", true).await.unwrap();
    assert!(matches!(
        outcome,
        GenerationOutcome::Complete {
            stored: false,
            attempt_count: 1,
            ..
        }
    ));
}
