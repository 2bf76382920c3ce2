//! Shared test utilities for integration tests
//!
//! Scripted collaborators for the generation service and a helper that wires
//! a service over a temporary sled store.

use async_trait::async_trait;
use bookwise::error::{ProviderError, ResolveError};
use bookwise::metadata::{BookMetadata, MetadataResolver};
use bookwise::provider::{StructuredLlmClient, StructuredRequest};
use bookwise::store::SledGenerationStore;
use bookwise::telemetry::MetricsRegistry;
use bookwise::{GenerationService, ServiceSettings};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// What the fake LLM does when called.
#[derive(Clone)]
pub enum Behavior {
    /// Return the payload after an optional delay.
    Respond(Value, Duration),
    Timeout,
    Upstream,
    /// Never return.
    Hang,
    Panic,
}

/// Counts calls and follows a scripted behavior, switchable between calls.
pub struct FakeLlm {
    calls: AtomicUsize,
    behavior: parking_lot::Mutex<Behavior>,
    started: Notify,
}

impl FakeLlm {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior: parking_lot::Mutex::new(behavior),
            started: Notify::new(),
        })
    }

    pub fn responding(payload: Value) -> Arc<Self> {
        Self::new(Behavior::Respond(payload, Duration::ZERO))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    /// Resolves once a call has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl StructuredLlmClient for FakeLlm {
    async fn generate_structured(&self, _request: StructuredRequest) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        let behavior = self.behavior.lock().clone();
        match behavior {
            Behavior::Respond(payload, delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(payload)
            }
            Behavior::Timeout => Err(ProviderError::timeout("request timed out")),
            Behavior::Upstream => Err(ProviderError::upstream("HTTP 502")),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("provider client bug"),
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Resolves every id except `missing`.
pub struct FakeResolver;

#[async_trait]
impl MetadataResolver for FakeResolver {
    async fn resolve(&self, book_id: &str) -> Result<BookMetadata, ResolveError> {
        if book_id == "missing" {
            return Err(ResolveError::NotFound(book_id.to_string()));
        }
        Ok(BookMetadata {
            book_id: book_id.to_string(),
            title: "The Pragmatic Programmer".to_string(),
            authors: vec!["Andrew Hunt".to_string(), "David Thomas".to_string()],
            first_publish_year: Some(1999),
            cover_url: None,
            openlibrary_url: format!("https://openlibrary.org/works/{}", book_id),
        })
    }
}

pub fn overview_payload() -> Value {
    json!({
        "overview": "A practical guide to the craft of writing software.",
        "reading_time_minutes": 15
    })
}

pub fn key_ideas_payload() -> Value {
    json!({"key_ideas": ["Care about your craft", "Think about your work", "Don't live with broken windows"]})
}

/// A service over a fresh store, plus the pieces tests inspect.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SledGenerationStore>,
    pub llm: Arc<FakeLlm>,
    pub metrics: Arc<MetricsRegistry>,
    pub service: Arc<GenerationService>,
}

pub fn harness(llm: Arc<FakeLlm>) -> Harness {
    harness_with(llm, ServiceSettings::default())
}

pub fn harness_with(llm: Arc<FakeLlm>, settings: ServiceSettings) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledGenerationStore::new(dir.path().join("store")).unwrap());
    let metrics = Arc::new(MetricsRegistry::new());
    let service = GenerationService::new(store.clone(), llm.clone(), Arc::new(FakeResolver), settings)
        .with_observer(metrics.clone());
    Harness {
        dir,
        store,
        llm,
        metrics,
        service: Arc::new(service),
    }
}
