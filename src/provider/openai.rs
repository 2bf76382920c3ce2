//! OpenAI Responses API client with strict JSON-schema output.

use crate::error::ProviderError;
use crate::provider::{parse_structured_output, StructuredLlmClient, StructuredRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::error;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const OPENAI_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    text: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

// Timeouts are reported separately so the failed record says `timeout`.
fn map_http_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::timeout(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ProviderError::upstream(format!("Connection error: {}", error))
    } else {
        ProviderError::upstream(format!("HTTP error: {}", error))
    }
}

/// OpenAI client for the `/responses` endpoint.
pub struct OpenAiStructuredClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiStructuredClient {
    /// `timeout` bounds the whole request; it is the generation timeout.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(OPENAI_HTTP_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::upstream(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl StructuredLlmClient for OpenAiStructuredClient {
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, ProviderError> {
        let body = ResponsesRequest {
            model: &request.model,
            input: &request.prompt,
            text: json!({
                "format": {
                    "type": "json_schema",
                    "name": request.schema_name,
                    "schema": request.schema,
                    "strict": true,
                }
            }),
            temperature: request.tuning.temperature,
            max_output_tokens: request.tuning.max_output_tokens,
        };

        let url = format!("{}/responses", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                cache_key = %request.cache_key,
                status = status.as_u16(),
                body = %error_text,
                "OpenAI request rejected"
            );
            return Err(ProviderError::upstream(format!(
                "Request failed with status {}",
                status
            )));
        }

        let payload: Value = response.json().await.map_err(map_http_error)?;
        let text = output_text(&payload)
            .ok_or_else(|| ProviderError::Output("Provider returned empty output".to_string()))?;
        parse_structured_output(&text)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Concatenated `output_text` parts of a Responses API payload.
pub fn output_text(payload: &Value) -> Option<String> {
    if let Some(text) = payload.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let text: String = payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content")?.as_array())
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text")?.as_str())
        .collect();
    (!text.is_empty()).then_some(text)
}
