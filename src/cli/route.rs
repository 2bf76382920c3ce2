//! CLI route: single route table and run context. Dispatches to the
//! generation service and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_generation_json, format_generation_text, format_status_json, format_status_text,
};
use crate::config::{BookwiseConfig, ConfigLoader};
use crate::error::{ApiError, StorageError};
use crate::generation::{GenerationOutcome, GenerationService, ServiceSettings};
use crate::metadata::{CachingResolver, MetadataResolver, OpenLibraryResolver};
use crate::provider::{OpenAiStructuredClient, StructuredLlmClient};
use crate::store::{GenerationRecordStore, SledGenerationStore};
use crate::telemetry::{MetricsRegistry, MetricsSnapshot};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: workspace, loaded config, and the
/// opened record store.
pub struct RunContext {
    config: BookwiseConfig,
    workspace_root: PathBuf,
    store: Arc<SledGenerationStore>,
    metrics: Arc<MetricsRegistry>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = Self::load_config(&workspace_root, config_path.as_deref())?;
        Self::with_config(workspace_root, config)
    }

    /// Load configuration from an explicit file or the workspace layers.
    pub fn load_config(
        workspace_root: &Path,
        config_path: Option<&Path>,
    ) -> Result<BookwiseConfig, ApiError> {
        Ok(match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(workspace_root)?,
        })
    }

    /// Create run context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: BookwiseConfig) -> Result<Self, ApiError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;

        let store_path = resolve_path(&workspace_root, &config.storage.store_path);
        std::fs::create_dir_all(&store_path)
            .map_err(StorageError::from)?;
        let store = SledGenerationStore::open_with_wait(
            &store_path,
            Duration::from_millis(config.storage.lock_wait_ms),
        )?
        .with_error_message_limit(config.generation.error_message_limit);
        debug!(store_path = %store_path.display(), "Opened generation store");

        Ok(Self {
            config,
            workspace_root,
            store: Arc::new(store),
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    pub fn config(&self) -> &BookwiseConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Build a generation service over the given collaborators, sharing this
    /// context's store and metrics.
    pub fn service_with(
        &self,
        llm: Arc<dyn StructuredLlmClient>,
        resolver: Arc<dyn MetadataResolver>,
    ) -> GenerationService {
        let mut settings = ServiceSettings::from_config(&self.config);
        settings.provider = llm.provider_name().to_string();
        GenerationService::new(self.store.clone(), llm, resolver, settings)
            .with_observer(self.metrics.clone())
    }

    fn default_service(&self) -> Result<GenerationService, ApiError> {
        let api_key = self
            .config
            .llm
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "No OpenAI API key configured (set OPENAI_API_KEY or llm.api_key)".to_string(),
                )
            })?;
        let llm = OpenAiStructuredClient::new(
            api_key,
            self.config.llm.base_url.clone(),
            Duration::from_secs(self.config.llm.timeout_seconds),
        )
        .map_err(|e| ApiError::ProviderError(e.to_string()))?;

        let openlibrary = OpenLibraryResolver::new(
            Some(self.config.openlibrary.base_url.clone()),
            Duration::from_secs(self.config.openlibrary.timeout_seconds),
        )
        .map_err(|e| ApiError::ProviderError(e.to_string()))?;
        let resolver = CachingResolver::new(self.store.db(), Arc::new(openlibrary))?;

        Ok(self.service_with(Arc::new(llm), Arc::new(resolver)))
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let service = match command {
            Commands::Generate { .. } => Some(self.default_service()?),
            Commands::Status { .. } => None,
        };
        self.execute_with(command, service.as_ref()).await
    }

    /// Execute a command with an explicit service (used when collaborators
    /// are provided by the caller).
    pub async fn execute_with(
        &self,
        command: &Commands,
        service: Option<&GenerationService>,
    ) -> Result<String, ApiError> {
        match command {
            Commands::Generate {
                book_id,
                section,
                force,
                format,
                metrics,
            } => {
                let service = service.ok_or_else(|| {
                    ApiError::ConfigError("Generation service is not configured".to_string())
                })?;
                let outcome = service.generate(book_id, section, *force).await;
                self.store.flush()?;
                let outcome = outcome?;
                info!(book_id = %book_id, section = %section, status = outcome.status(), "Generate command finished");

                let snapshot = metrics.then(|| self.metrics.snapshot());
                format_generation(&outcome, format, snapshot.as_ref())
            }
            Commands::Status { book_id, format } => {
                let records = self.store.list_for_book(book_id)?;
                if format == "json" {
                    format_status_json(&records)
                } else {
                    Ok(format_status_text(book_id, &records))
                }
            }
        }
    }

    /// Flush the store; used before exiting without unwinding.
    pub fn flush(&self) -> Result<(), ApiError> {
        Ok(self.store.flush()?)
    }
}

/// Answer for a command that could not open the store because another
/// process holds it. A `generate` reports the key as in progress; every
/// other command keeps its error.
pub fn busy_output(
    config: &BookwiseConfig,
    command: &Commands,
    err: &ApiError,
) -> Option<Result<String, ApiError>> {
    let ApiError::StorageError(StorageError::Locked(path)) = err else {
        return None;
    };
    let Commands::Generate { format, .. } = command else {
        return None;
    };
    warn!(store_path = %path, "Store held by another process, reporting in progress");
    let outcome = GenerationOutcome::Pending {
        retry_after_ms: config.generation.retry_after_ms,
    };
    Some(format_generation(&outcome, format, None))
}

/// Drive `work` until it finishes or `interrupt` resolves first. On
/// interrupt the work future is dropped, which releases any claim it holds.
pub async fn until_interrupted<W, I>(work: W, interrupt: I) -> Option<W::Output>
where
    W: Future,
    I: Future<Output = ()>,
{
    tokio::select! {
        output = work => Some(output),
        _ = interrupt => None,
    }
}

fn format_generation(
    outcome: &GenerationOutcome,
    format: &str,
    snapshot: Option<&MetricsSnapshot>,
) -> Result<String, ApiError> {
    if format == "json" {
        format_generation_json(outcome, snapshot)
    } else {
        let mut out = format_generation_text(outcome);
        if let Some(snapshot) = snapshot {
            out.push_str("\n\nMetrics:\n");
            out.push_str(&metrics_json(snapshot)?);
        }
        Ok(out)
    }
}

fn metrics_json(snapshot: &MetricsSnapshot) -> Result<String, ApiError> {
    serde_json::to_string_pretty(snapshot)
        .map_err(|e| ApiError::StorageError(StorageError::from_json(e)))
}

/// Relative paths are taken from the workspace root.
fn resolve_path(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}
