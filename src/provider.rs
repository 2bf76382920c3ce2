//! Structured-output LLM provider abstraction
//!
//! The generation executor needs exactly one capability from a model
//! provider: a single request that returns a JSON object conforming to a
//! strict schema. [`StructuredLlmClient`] captures that; [`OpenAiStructuredClient`]
//! implements it against the OpenAI Responses API.

pub mod openai;

pub use openai::OpenAiStructuredClient;

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sampling options forwarded to the provider when set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// One structured generation call.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub model: String,
    pub prompt: String,
    /// Strict JSON schema the output must satisfy.
    pub schema: Value,
    pub schema_name: String,
    pub tuning: Tuning,
    /// Rendered cache key, for provider-side log correlation only.
    pub cache_key: String,
}

/// Performs one structured-output request.
///
/// Errors distinguish a failed exchange (`ProviderError::Transport`) from a
/// response whose body is empty, not JSON, or not a JSON object
/// (`ProviderError::Output`).
#[async_trait]
pub trait StructuredLlmClient: Send + Sync {
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, ProviderError>;

    /// Provider name recorded in the cache key.
    fn provider_name(&self) -> &str;
}

/// Parse raw model text into a JSON object.
pub fn parse_structured_output(text: &str) -> Result<Value, ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::Output("Provider returned empty output".to_string()));
    }
    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| ProviderError::Output(format!("Provider returned invalid JSON: {}", e)))?;
    if !parsed.is_object() {
        return Err(ProviderError::Output(
            "Provider returned a non-object payload".to_string(),
        ));
    }
    Ok(parsed)
}
