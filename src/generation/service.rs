//! Generation service: the inbound `generate` operation.

use crate::config::BookwiseConfig;
use crate::content::{OutputValidator, SectionSchemaValidator};
use crate::error::{GenerationError, ResolveError};
use crate::generation::coordinator::{ClaimCoordinator, ClaimOutcome};
use crate::generation::executor::GenerationExecutor;
use crate::generation::{GenerationOutcome, DEFAULT_MAX_CLAIM_ATTEMPTS, DEFAULT_RETRY_AFTER_MS};
use crate::metadata::MetadataResolver;
use crate::prompt::{PROMPT_VERSION, SCHEMA_VERSION};
use crate::provider::{StructuredLlmClient, Tuning};
use crate::store::GenerationRecordStore;
use crate::telemetry::{GenerationObserver, NoopObserver};
use crate::types::{CacheKey, Section};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Knobs of one service instance.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub provider: String,
    pub model: String,
    pub tuning: Tuning,
    pub llm_timeout: Option<Duration>,
    pub retry_after_ms: u64,
    pub max_claim_attempts: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-5-mini".to_string(),
            tuning: Tuning::default(),
            llm_timeout: None,
            retry_after_ms: DEFAULT_RETRY_AFTER_MS,
            max_claim_attempts: DEFAULT_MAX_CLAIM_ATTEMPTS,
        }
    }
}

impl ServiceSettings {
    pub fn from_config(config: &BookwiseConfig) -> Self {
        Self {
            provider: config.llm.provider.clone(),
            model: config.llm.model.clone(),
            tuning: Tuning {
                temperature: config.llm.temperature,
                max_output_tokens: config.llm.max_output_tokens,
            },
            llm_timeout: Some(Duration::from_secs(config.llm.timeout_seconds)),
            retry_after_ms: config.generation.retry_after_ms,
            max_claim_attempts: config.generation.max_claim_attempts,
        }
    }
}

/// Coordinates section generation for any number of concurrent callers.
pub struct GenerationService {
    resolver: Arc<dyn MetadataResolver>,
    observer: Arc<dyn GenerationObserver>,
    coordinator: ClaimCoordinator,
    executor: GenerationExecutor,
    settings: ServiceSettings,
    store: Arc<dyn GenerationRecordStore>,
    llm: Arc<dyn StructuredLlmClient>,
    validator: Arc<dyn OutputValidator>,
}

impl GenerationService {
    pub fn new(
        store: Arc<dyn GenerationRecordStore>,
        llm: Arc<dyn StructuredLlmClient>,
        resolver: Arc<dyn MetadataResolver>,
        settings: ServiceSettings,
    ) -> Self {
        let observer: Arc<dyn GenerationObserver> = Arc::new(NoopObserver);
        let validator: Arc<dyn OutputValidator> = Arc::new(SectionSchemaValidator);
        Self::assemble(store, llm, resolver, validator, observer, settings)
    }

    pub fn with_observer(self, observer: Arc<dyn GenerationObserver>) -> Self {
        Self::assemble(
            self.store,
            self.llm,
            self.resolver,
            self.validator,
            observer,
            self.settings,
        )
    }

    pub fn with_validator(self, validator: Arc<dyn OutputValidator>) -> Self {
        Self::assemble(
            self.store,
            self.llm,
            self.resolver,
            validator,
            self.observer,
            self.settings,
        )
    }

    fn assemble(
        store: Arc<dyn GenerationRecordStore>,
        llm: Arc<dyn StructuredLlmClient>,
        resolver: Arc<dyn MetadataResolver>,
        validator: Arc<dyn OutputValidator>,
        observer: Arc<dyn GenerationObserver>,
        settings: ServiceSettings,
    ) -> Self {
        let coordinator = ClaimCoordinator::new(store.clone())
            .with_observer(observer.clone())
            .with_retry_after_ms(settings.retry_after_ms)
            .with_max_attempts(settings.max_claim_attempts);
        let executor = GenerationExecutor::new(store.clone(), llm.clone(), validator.clone())
            .with_observer(observer.clone())
            .with_tuning(settings.tuning)
            .with_llm_timeout(settings.llm_timeout);
        Self {
            resolver,
            observer,
            coordinator,
            executor,
            settings,
            store,
            llm,
            validator,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn GenerationRecordStore> {
        &self.store
    }

    /// Cache key for a section of a book under this service's prompt version,
    /// provider and model.
    pub fn cache_key(&self, book_id: &str, section: Section) -> CacheKey {
        CacheKey::new(
            book_id,
            section,
            PROMPT_VERSION,
            self.settings.provider.as_str(),
            self.settings.model.as_str(),
        )
    }

    /// Serve, report, or generate one section of one book.
    ///
    /// The book is resolved before any record is touched, so an unknown book
    /// never creates a record.
    pub async fn generate(
        &self,
        book_id: &str,
        section: &str,
        force: bool,
    ) -> Result<GenerationOutcome, GenerationError> {
        let section: Section = section.parse()?;

        let book = self.resolver.resolve(book_id).await.map_err(|err| {
            warn!(book_id, section = %section, error = %err, "Book resolution failed");
            match err {
                ResolveError::NotFound(id) => GenerationError::NotFound(id),
                ResolveError::Upstream(_) => GenerationError::NotFound(book_id.to_string()),
            }
        })?;

        let key = self.cache_key(book_id, section);
        match self.coordinator.claim(&key, SCHEMA_VERSION, force)? {
            ClaimOutcome::ObservedComplete(record) => {
                self.observer.cache_hit(section);
                info!(book_id, section = %section, status = "complete", "generation.cache.decision");
                GenerationOutcome::complete(record, true)
            }
            ClaimOutcome::InProgress { retry_after_ms } => {
                self.observer.in_progress(section);
                info!(book_id, section = %section, status = "pending", "generation.cache.decision");
                Ok(GenerationOutcome::Pending { retry_after_ms })
            }
            ClaimOutcome::PreviouslyFailed { error_code } => {
                self.observer
                    .previously_failed(section, error_code.as_deref());
                info!(
                    book_id,
                    section = %section,
                    status = "failed",
                    error_code = error_code.as_deref().unwrap_or(""),
                    "generation.cache.decision"
                );
                Ok(GenerationOutcome::Failed { error_code })
            }
            ClaimOutcome::Claimed(record) => {
                self.observer.cache_miss(section);
                info!(
                    book_id,
                    section = %section,
                    status = "miss",
                    attempt = record.attempt_count,
                    "generation.cache.decision"
                );
                self.executor.run(record, &book).await
            }
        }
    }
}
