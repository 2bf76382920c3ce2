//! Claim coordinator: decides, for one request, whether this caller generates.

use crate::error::GenerationError;
use crate::generation::decision::{decide, Action, RecordState};
use crate::generation::{DEFAULT_MAX_CLAIM_ATTEMPTS, DEFAULT_RETRY_AFTER_MS};
use crate::store::{
    GenerationRecord, GenerationRecordStore, GenerationStatus, InsertOutcome,
    RECLAIMABLE_STATUSES,
};
use crate::telemetry::{GenerationObserver, NoopObserver};
use crate::types::CacheKey;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Result of consulting the store for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// This caller owns the `pending` record and must finalize it.
    Claimed(GenerationRecord),
    ObservedComplete(GenerationRecord),
    InProgress { retry_after_ms: u64 },
    PreviouslyFailed { error_code: Option<String> },
}

/// Applies the decision table against the store until one observation sticks.
///
/// Every write is conditional. When a write loses to a concurrent request the
/// key is re-read and the table applied again, at most `max_attempts` times.
pub struct ClaimCoordinator {
    store: Arc<dyn GenerationRecordStore>,
    observer: Arc<dyn GenerationObserver>,
    retry_after_ms: u64,
    max_attempts: u32,
}

impl ClaimCoordinator {
    pub fn new(store: Arc<dyn GenerationRecordStore>) -> Self {
        Self {
            store,
            observer: Arc::new(NoopObserver),
            retry_after_ms: DEFAULT_RETRY_AFTER_MS,
            max_attempts: DEFAULT_MAX_CLAIM_ATTEMPTS,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn GenerationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_retry_after_ms(mut self, retry_after_ms: u64) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn claim(
        &self,
        key: &CacheKey,
        schema_version: &str,
        force: bool,
    ) -> Result<ClaimOutcome, GenerationError> {
        let mut current = self.store.find(key)?;

        for attempt in 1..=self.max_attempts {
            let action = decide(RecordState::of(current.as_ref()), force);
            debug!(cache_key = %key, attempt, ?action, "Claim decision");
            if let Some(outcome) = self.observed(action, current.as_ref()) {
                return Ok(outcome);
            }

            match (action, current) {
                (Action::InsertPending, _) => {
                    let started = Instant::now();
                    let outcome = self.store.insert_pending(key, schema_version)?;
                    self.observer
                        .store_write(GenerationStatus::Pending, started.elapsed());
                    if let InsertOutcome::Inserted(record) = outcome {
                        return Ok(ClaimOutcome::Claimed(record));
                    }
                    debug!(cache_key = %key, attempt, "Lost insert race");
                }
                (Action::ClaimForRegen, Some(record)) => {
                    let started = Instant::now();
                    let won = self
                        .store
                        .claim_for_regeneration(record.id, &RECLAIMABLE_STATUSES)?;
                    self.observer
                        .store_write(GenerationStatus::Pending, started.elapsed());
                    if won {
                        return match self.store.get(record.id)? {
                            Some(claimed) => Ok(ClaimOutcome::Claimed(claimed)),
                            None => Err(GenerationError::UpstreamUnavailable(format!(
                                "claimed record {} is no longer stored",
                                record.id
                            ))),
                        };
                    }
                    debug!(cache_key = %key, attempt, "Lost regeneration claim");
                }
                (_, _) => {
                    return Err(GenerationError::UpstreamUnavailable(format!(
                        "no record for {} to act on",
                        key
                    )));
                }
            }

            current = self.store.find(key)?;
            if current.is_none() {
                return Err(GenerationError::UpstreamUnavailable(format!(
                    "generation state for {} vanished after a conflicting write",
                    key
                )));
            }
        }

        // The last re-read still counts when it needs no write.
        let action = decide(RecordState::of(current.as_ref()), force);
        if let Some(outcome) = self.observed(action, current.as_ref()) {
            debug!(cache_key = %key, ?action, "Settled on final read");
            return Ok(outcome);
        }

        Err(GenerationError::UpstreamUnavailable(format!(
            "could not settle generation state for {} after {} attempts",
            key, self.max_attempts
        )))
    }

    /// Outcome for actions that only report what the store holds.
    fn observed(&self, action: Action, record: Option<&GenerationRecord>) -> Option<ClaimOutcome> {
        match (action, record) {
            (Action::SignalInProgress, _) => Some(ClaimOutcome::InProgress {
                retry_after_ms: self.retry_after_ms,
            }),
            (Action::ServeCached, Some(record)) => {
                Some(ClaimOutcome::ObservedComplete(record.clone()))
            }
            (Action::SignalFailed, Some(record)) => Some(ClaimOutcome::PreviouslyFailed {
                error_code: record.error_code.clone(),
            }),
            _ => None,
        }
    }
}
