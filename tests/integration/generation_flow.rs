//! End-to-end request flow through the generation service

use super::test_utils::{harness, key_ideas_payload, overview_payload, Behavior, FakeLlm};
use bookwise::generation::error_code;
use bookwise::prompt::SCHEMA_VERSION;
use bookwise::store::{GenerationRecordStore, GenerationStatus, InsertOutcome};
use bookwise::{GenerationError, GenerationOutcome, Section};

#[tokio::test]
async fn test_absent_key_is_generated_then_served_from_store() {
    let h = harness(FakeLlm::responding(overview_payload()));

    let first = h.service.generate("OL45804W", "overview", false).await.unwrap();
    match &first {
        GenerationOutcome::Complete {
            stored,
            attempt_count,
            content,
            key,
            ..
        } => {
            assert!(!stored);
            assert_eq!(*attempt_count, 1);
            assert_eq!(content, &overview_payload());
            assert_eq!(key.section, Section::Overview);
        }
        other => panic!("expected complete, got {:?}", other),
    }

    let second = h.service.generate("OL45804W", "overview", false).await.unwrap();
    match second {
        GenerationOutcome::Complete {
            stored, content, ..
        } => {
            assert!(stored);
            assert_eq!(content, overview_payload());
        }
        other => panic!("expected complete, got {:?}", other),
    }

    assert_eq!(h.llm.calls(), 1);
    let records = h.store.list_for_book("OL45804W").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, GenerationStatus::Complete);
    assert!(records[0].finished_at.is_some());
}

#[tokio::test]
async fn test_pending_record_reports_in_progress_without_calling_llm() {
    let h = harness(FakeLlm::responding(overview_payload()));
    let key = h.service.cache_key("OL1W", Section::Overview);
    assert!(matches!(
        h.store.insert_pending(&key, SCHEMA_VERSION).unwrap(),
        InsertOutcome::Inserted(_)
    ));

    let outcome = h.service.generate("OL1W", "overview", false).await.unwrap();
    assert_eq!(outcome, GenerationOutcome::Pending { retry_after_ms: 500 });
    assert_eq!(h.llm.calls(), 0);

    // Forcing does not steal a live claim either.
    let forced = h.service.generate("OL1W", "overview", true).await.unwrap();
    assert_eq!(forced, GenerationOutcome::Pending { retry_after_ms: 500 });
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn test_failed_record_is_reported_until_forced() {
    let h = harness(FakeLlm::new(Behavior::Timeout));

    let err = h.service.generate("OL1W", "key_ideas", false).await.unwrap_err();
    assert!(matches!(err, GenerationError::UpstreamUnavailable(_)));

    let reported = h.service.generate("OL1W", "key_ideas", false).await.unwrap();
    assert_eq!(
        reported,
        GenerationOutcome::Failed {
            error_code: Some(error_code::TIMEOUT.to_string())
        }
    );
    assert_eq!(h.llm.calls(), 1);

    h.llm.set_behavior(Behavior::Respond(key_ideas_payload(), Default::default()));
    let retried = h.service.generate("OL1W", "key_ideas", true).await.unwrap();
    match retried {
        GenerationOutcome::Complete {
            stored,
            attempt_count,
            ..
        } => {
            assert!(!stored);
            assert_eq!(attempt_count, 2);
        }
        other => panic!("expected complete, got {:?}", other),
    }
    assert_eq!(h.llm.calls(), 2);

    let record = h
        .store
        .find(&h.service.cache_key("OL1W", Section::KeyIdeas))
        .unwrap()
        .unwrap();
    assert_eq!(record.status, GenerationStatus::Complete);
    assert!(record.error_code.is_none());
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn test_sections_are_independent_keys() {
    let h = harness(FakeLlm::responding(overview_payload()));
    h.service.generate("OL1W", "overview", false).await.unwrap();

    h.llm.set_behavior(Behavior::Respond(key_ideas_payload(), Default::default()));
    h.service.generate("OL1W", "key_ideas", false).await.unwrap();
    h.service.generate("OL2W", "key_ideas", false).await.unwrap();

    assert_eq!(h.llm.calls(), 3);
    let sections: Vec<Section> = h
        .store
        .list_for_book("OL1W")
        .unwrap()
        .iter()
        .map(|r| r.key.section)
        .collect();
    assert_eq!(sections.len(), 2);
    assert!(sections.contains(&Section::Overview));
    assert!(sections.contains(&Section::KeyIdeas));
    assert_eq!(h.store.list_for_book("OL2W").unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_requests_create_no_records() {
    let h = harness(FakeLlm::responding(overview_payload()));

    let err = h.service.generate("OL1W", "summary", false).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidSection(_)));

    let err = h.service.generate("missing", "overview", false).await.unwrap_err();
    assert!(matches!(err, GenerationError::NotFound(_)));

    assert_eq!(h.llm.calls(), 0);
    assert!(h.store.list_for_book("OL1W").unwrap().is_empty());
    assert!(h.store.list_for_book("missing").unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_follow_request_outcomes() {
    let h = harness(FakeLlm::responding(overview_payload()));
    h.service.generate("OL1W", "overview", false).await.unwrap();
    h.service.generate("OL1W", "overview", false).await.unwrap();

    let labels = [("section", "overview"), ("status", "complete")];
    assert_eq!(h.metrics.counter("generation.status.complete", &labels), 2);
    assert_eq!(
        h.metrics
            .counter("cache.miss", &[("section", "overview"), ("status", "miss")]),
        1
    );
    let snapshot = h.metrics.snapshot();
    assert!(snapshot
        .timers_ms
        .keys()
        .any(|name| name.starts_with("openai.latency_ms")));
}
