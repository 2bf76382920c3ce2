//! Configuration System
//!
//! Layered configuration: built-in defaults, the global user file, workspace
//! files, then environment overrides. See [`ConfigLoader`] for the order.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BookwiseConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub openlibrary: OpenLibraryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM provider settings. The provider, model and prompt version together
/// select the cache key, so changing any of them starts a fresh cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: Option<u32>,

    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Override for the provider endpoint (proxies, compatible servers)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_max_output_tokens() -> Option<u32> {
    Some(1200)
}

fn default_llm_timeout() -> u64 {
    45
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: None,
            max_output_tokens: default_max_output_tokens(),
            timeout_seconds: default_llm_timeout(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Claim and record tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_retry_after_ms")]
    pub retry_after_ms: u64,

    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: u32,

    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,
}

fn default_retry_after_ms() -> u64 {
    crate::generation::DEFAULT_RETRY_AFTER_MS
}

fn default_max_claim_attempts() -> u32 {
    crate::generation::DEFAULT_MAX_CLAIM_ATTEMPTS
}

fn default_error_message_limit() -> usize {
    crate::store::DEFAULT_ERROR_MESSAGE_LIMIT
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            retry_after_ms: default_retry_after_ms(),
            max_claim_attempts: default_max_claim_attempts(),
            error_message_limit: default_error_message_limit(),
        }
    }
}

/// Open Library client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenLibraryConfig {
    #[serde(default = "default_openlibrary_url")]
    pub base_url: String,

    #[serde(default = "default_openlibrary_timeout")]
    pub timeout_seconds: u64,
}

fn default_openlibrary_url() -> String {
    crate::metadata::openlibrary::DEFAULT_OPENLIBRARY_BASE_URL.to_string()
}

fn default_openlibrary_timeout() -> u64 {
    10
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            base_url: default_openlibrary_url(),
            timeout_seconds: default_openlibrary_timeout(),
        }
    }
}

/// Storage paths, relative to the workspace root unless absolute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// How long to wait for another process to release the store.
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".bookwise/store")
}

fn default_lock_wait_ms() -> u64 {
    2000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Llm(String),
    Generation(String),
    OpenLibrary(String),
    Storage(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Llm(msg) => write!(f, "llm: {}", msg),
            ValidationError::Generation(msg) => write!(f, "generation: {}", msg),
            ValidationError::OpenLibrary(msg) => write!(f, "openlibrary: {}", msg),
            ValidationError::Storage(msg) => write!(f, "storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl BookwiseConfig {
    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.llm.provider != "openai" {
            errors.push(ValidationError::Llm(format!(
                "Unsupported provider '{}' (only 'openai' is supported)",
                self.llm.provider
            )));
        }
        if self.llm.model.trim().is_empty() {
            errors.push(ValidationError::Llm("Model cannot be empty".to_string()));
        }
        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                errors.push(ValidationError::Llm(format!(
                    "Temperature must be within 0.0..=2.0, got {}",
                    temperature
                )));
            }
        }
        if self.llm.max_output_tokens == Some(0) {
            errors.push(ValidationError::Llm(
                "max_output_tokens must be positive".to_string(),
            ));
        }
        if self.llm.timeout_seconds == 0 {
            errors.push(ValidationError::Llm("timeout_seconds must be positive".to_string()));
        }
        if let Some(url) = &self.llm.base_url {
            if !is_http_url(url) {
                errors.push(ValidationError::Llm(format!("Invalid base_url '{}'", url)));
            }
        }

        if self.generation.max_claim_attempts == 0 {
            errors.push(ValidationError::Generation(
                "max_claim_attempts must be at least 1".to_string(),
            ));
        }
        if self.generation.error_message_limit == 0 {
            errors.push(ValidationError::Generation(
                "error_message_limit must be positive".to_string(),
            ));
        }

        if !is_http_url(&self.openlibrary.base_url) {
            errors.push(ValidationError::OpenLibrary(format!(
                "Invalid base_url '{}'",
                self.openlibrary.base_url
            )));
        }
        if self.openlibrary.timeout_seconds == 0 {
            errors.push(ValidationError::OpenLibrary(
                "timeout_seconds must be positive".to_string(),
            ));
        }

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("Store path cannot be empty".to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
