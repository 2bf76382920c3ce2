//! Generation executor: turns a claimed record into a terminal one.
//!
//! Owns the external call. Whatever happens after the claim (provider error,
//! invalid output, panic, or the caller dropping the future) the record is
//! written as `complete` or `failed` before the claim is released.

use crate::content::{strict_section_schema, OutputValidator};
use crate::error::{ContentRejected, GenerationError, ProviderError, StorageError, TransportKind};
use crate::generation::{error_code, GenerationOutcome};
use crate::metadata::BookMetadata;
use crate::prompt::build_prompt;
use crate::provider::{StructuredLlmClient, StructuredRequest, Tuning};
use crate::store::{GenerationRecord, GenerationRecordStore, GenerationStatus};
use crate::telemetry::{GenerationObserver, NoopObserver};
use crate::types::{RecordId, Section};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Schema name sent with every structured request.
pub const SCHEMA_NAME: &str = "bookwise_generation";

/// Why an attempt failed: the stored code and message, plus what the caller sees.
#[derive(Debug)]
struct Failure {
    code: &'static str,
    message: String,
    error: GenerationError,
}

impl Failure {
    fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport { kind, message } => {
                let code = match kind {
                    TransportKind::Timeout => error_code::TIMEOUT,
                    TransportKind::Upstream => error_code::OPENAI_ERROR,
                };
                Failure {
                    code,
                    error: GenerationError::UpstreamUnavailable("LLM provider unavailable".to_string()),
                    message,
                }
            }
            ProviderError::Output(message) => Failure {
                code: error_code::SCHEMA_VALIDATION,
                error: GenerationError::InvalidOutput(message.clone()),
                message,
            },
        }
    }

    fn from_rejection(rejected: ContentRejected) -> Self {
        let message = rejected.to_string();
        Failure {
            code: error_code::SCHEMA_VALIDATION,
            error: GenerationError::InvalidOutput(message.clone()),
            message,
        }
    }

    fn timed_out(limit: Duration) -> Self {
        Failure {
            code: error_code::TIMEOUT,
            message: format!("LLM call exceeded {:?}", limit),
            error: GenerationError::UpstreamUnavailable("LLM provider timed out".to_string()),
        }
    }

    fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Failure {
            code: error_code::UNEXPECTED,
            message: format!("Unexpected generation failure: {}", detail),
            error: GenerationError::UpstreamUnavailable("Generation failed".to_string()),
        }
    }
}

/// Holds a claim until it is finalized. Dropping an armed guard records the
/// claim as `abandoned`.
struct ClaimGuard<'a> {
    store: &'a dyn GenerationRecordStore,
    observer: &'a dyn GenerationObserver,
    record_id: RecordId,
    section: Section,
    model: &'a str,
    armed: bool,
}

impl ClaimGuard<'_> {
    fn complete(mut self, content: Value) -> Result<GenerationRecord, StorageError> {
        let started = Instant::now();
        match self.store.mark_complete(self.record_id, content) {
            Ok(record) => {
                self.armed = false;
                self.observer
                    .store_write(GenerationStatus::Complete, started.elapsed());
                Ok(record)
            }
            Err(err) => {
                let message = format!("Failed to store generated content: {}", err);
                self.release_as_failed(error_code::UNEXPECTED, &message);
                Err(err)
            }
        }
    }

    fn fail(mut self, code: &str, message: &str) -> Result<GenerationRecord, StorageError> {
        self.armed = false;
        self.observer.generation_failed(self.section, self.model, code);
        let started = Instant::now();
        let written = self.store.mark_failed(self.record_id, code, message);
        self.observer
            .store_write(GenerationStatus::Failed, started.elapsed());
        written
    }

    fn release_as_failed(&mut self, code: &str, message: &str) {
        self.armed = false;
        self.observer.generation_failed(self.section, self.model, code);
        if let Err(err) = self.store.mark_failed(self.record_id, code, message) {
            error!(
                record_id = %self.record_id,
                error_code = code,
                error = %err,
                "Could not release claimed record"
            );
        }
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                record_id = %self.record_id,
                section = %self.section,
                error_code = error_code::ABANDONED,
                "generation.record.failed"
            );
            self.release_as_failed(
                error_code::ABANDONED,
                "Generation was dropped before completion",
            );
        }
    }
}

/// Runs the external call for claimed records.
pub struct GenerationExecutor {
    store: Arc<dyn GenerationRecordStore>,
    llm: Arc<dyn StructuredLlmClient>,
    validator: Arc<dyn OutputValidator>,
    observer: Arc<dyn GenerationObserver>,
    tuning: Tuning,
    llm_timeout: Option<Duration>,
}

impl GenerationExecutor {
    pub fn new(
        store: Arc<dyn GenerationRecordStore>,
        llm: Arc<dyn StructuredLlmClient>,
        validator: Arc<dyn OutputValidator>,
    ) -> Self {
        Self {
            store,
            llm,
            validator,
            observer: Arc::new(NoopObserver),
            tuning: Tuning::default(),
            llm_timeout: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn GenerationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Upper bound on the LLM call, on top of any client-side timeout.
    pub fn with_llm_timeout(mut self, llm_timeout: Option<Duration>) -> Self {
        self.llm_timeout = llm_timeout;
        self
    }

    /// Generate content for a record this caller has claimed and finalize it.
    pub async fn run(
        &self,
        record: GenerationRecord,
        book: &BookMetadata,
    ) -> Result<GenerationOutcome, GenerationError> {
        let guard = ClaimGuard {
            store: self.store.as_ref(),
            observer: self.observer.as_ref(),
            record_id: record.id,
            section: record.key.section,
            model: &record.key.model,
            armed: true,
        };

        let attempt = AssertUnwindSafe(self.attempt(&record, book))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(Failure::panicked(payload)));

        match attempt {
            Ok(content) => {
                let completed = guard.complete(content)?;
                self.observer.generation_completed(completed.key.section);
                info!(
                    book_id = %completed.key.book_id,
                    section = %completed.key.section,
                    attempt = completed.attempt_count,
                    "generation.record.complete"
                );
                GenerationOutcome::complete(completed, false)
            }
            Err(failure) => {
                warn!(
                    book_id = %record.key.book_id,
                    section = %record.key.section,
                    attempt = record.attempt_count,
                    error_code = failure.code,
                    error = %failure.message,
                    "generation.record.failed"
                );
                guard.fail(failure.code, &failure.message)?;
                Err(failure.error)
            }
        }
    }

    async fn attempt(
        &self,
        record: &GenerationRecord,
        book: &BookMetadata,
    ) -> Result<Value, Failure> {
        let section = record.key.section;
        let request = StructuredRequest {
            model: record.key.model.clone(),
            prompt: build_prompt(section, book),
            schema: strict_section_schema(section),
            schema_name: SCHEMA_NAME.to_string(),
            tuning: self.tuning,
            cache_key: record.key.to_string(),
        };

        info!(
            book_id = %record.key.book_id,
            section = %section,
            attempt = record.attempt_count,
            "generation.llm.start"
        );
        let started = Instant::now();
        let call = self.llm.generate_structured(request);
        let response = match self.llm_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(response) => response,
                Err(_) => return Err(Failure::timed_out(limit)),
            },
            None => call.await,
        };
        let elapsed = started.elapsed();
        self.observer.llm_latency(section, &record.key.model, elapsed);
        info!(
            book_id = %record.key.book_id,
            section = %section,
            latency_ms = elapsed.as_secs_f64() * 1000.0,
            ok = response.is_ok(),
            "generation.llm.end"
        );

        let payload = response.map_err(Failure::from_provider)?;
        self.validator
            .validate(section, &payload)
            .map_err(Failure::from_rejection)
    }
}
