//! Concurrent requests for one cache key make exactly one external call

use super::test_utils::{harness, overview_payload, Behavior, FakeLlm};
use bookwise::store::{GenerationRecordStore, GenerationStatus};
use bookwise::GenerationOutcome;
use std::time::Duration;

const CALLERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_generate_once() {
    let llm = FakeLlm::new(Behavior::Respond(
        overview_payload(),
        Duration::from_millis(100),
    ));
    let h = harness(llm);

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let service = h.service.clone();
            tokio::spawn(async move { service.generate("OL45804W", "overview", false).await })
        })
        .collect();

    let mut generated = 0;
    let mut served = 0;
    let mut pending = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            GenerationOutcome::Complete { stored: false, .. } => generated += 1,
            GenerationOutcome::Complete { stored: true, .. } => served += 1,
            GenerationOutcome::Pending { retry_after_ms } => {
                assert_eq!(retry_after_ms, 500);
                pending += 1;
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(generated, 1);
    assert_eq!(generated + served + pending, CALLERS);
    assert_eq!(h.llm.calls(), 1);

    let records = h.store.list_for_book("OL45804W").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, GenerationStatus::Complete);
    assert_eq!(records[0].attempt_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_forced_requests_regenerate_once() {
    let h = harness(FakeLlm::responding(overview_payload()));
    h.service.generate("OL1W", "overview", false).await.unwrap();
    h.llm.set_behavior(Behavior::Respond(
        overview_payload(),
        Duration::from_millis(100),
    ));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let service = h.service.clone();
            tokio::spawn(async move { service.generate("OL1W", "overview", true).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // One initial generation, then at most one regeneration in flight at a
    // time. Forced callers that arrive after completion regenerate again, so
    // only the lower bound and the attempt counter agree exactly.
    let record = h.store.list_for_book("OL1W").unwrap().remove(0);
    assert_eq!(record.status, GenerationStatus::Complete);
    assert_eq!(record.attempt_count as usize, h.llm.calls());
    assert!(h.llm.calls() >= 2);
}
