//! Open Library metadata resolver

use crate::error::ResolveError;
use crate::metadata::{BookMetadata, MetadataResolver};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OPENLIBRARY_BASE_URL: &str = "https://openlibrary.org";

const MAX_AUTHORS: usize = 3;

/// Failure of one Open Library request.
#[derive(Debug)]
struct RequestFailure {
    status: Option<StatusCode>,
    message: String,
}

fn map_http_error(error: reqwest::Error) -> RequestFailure {
    let message = if error.is_timeout() {
        format!("Request timeout: {}", error)
    } else if error.is_connect() {
        format!("Connection error: {}", error)
    } else {
        format!("HTTP error: {}", error)
    };
    RequestFailure {
        status: error.status(),
        message,
    }
}

/// Resolver backed by the public Open Library works and authors endpoints.
pub struct OpenLibraryResolver {
    client: Client,
    base_url: String,
}

impl OpenLibraryResolver {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Upstream(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_OPENLIBRARY_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self { client, base_url })
    }

    async fn get_json(&self, path: &str) -> Result<Value, RequestFailure> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestFailure {
                status: Some(status),
                message: format!("Request to {} failed with status {}", path, status),
            });
        }

        response.json::<Value>().await.map_err(map_http_error)
    }
}

#[async_trait]
impl MetadataResolver for OpenLibraryResolver {
    async fn resolve(&self, book_id: &str) -> Result<BookMetadata, ResolveError> {
        let work = match self.get_json(&format!("/works/{}.json", book_id)).await {
            Ok(work) => work,
            Err(failure) if failure.status == Some(StatusCode::NOT_FOUND) => {
                return Err(ResolveError::NotFound(book_id.to_string()));
            }
            Err(failure) => return Err(ResolveError::Upstream(failure.message)),
        };

        let mut authors = Vec::new();
        for author_key in author_keys(&work) {
            match self.get_json(&format!("{}.json", author_key)).await {
                Ok(author) => {
                    if let Some(name) = author_name(&author) {
                        authors.push(name);
                    }
                }
                Err(failure) => {
                    warn!(book_id, author_key = %author_key, error = %failure.message, "Skipping unresolvable author");
                }
            }
        }

        debug!(book_id, authors = authors.len(), "Resolved work from Open Library");
        Ok(metadata_from_work(book_id, &work, authors))
    }
}

/// Build metadata from a `/works/{id}.json` payload and resolved author names.
pub fn metadata_from_work(book_id: &str, work: &Value, authors: Vec<String>) -> BookMetadata {
    let title = match work.get("title") {
        Some(Value::String(title)) => title.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let cover_url = work
        .get("covers")
        .and_then(Value::as_array)
        .and_then(|covers| covers.first())
        .and_then(Value::as_i64)
        .map(|cover_id| format!("https://covers.openlibrary.org/b/id/{}-L.jpg", cover_id));

    BookMetadata {
        book_id: book_id.to_string(),
        title,
        authors,
        first_publish_year: first_publish_year(work),
        cover_url,
        openlibrary_url: format!("{}/works/{}", DEFAULT_OPENLIBRARY_BASE_URL, book_id),
    }
}

/// `first_publish_year` if numeric, otherwise the leading four digits of
/// `first_publish_date`.
pub fn first_publish_year(work: &Value) -> Option<i32> {
    if let Some(year) = work.get("first_publish_year").and_then(Value::as_i64) {
        return i32::try_from(year).ok();
    }
    let date = work.get("first_publish_date")?.as_str()?;
    let prefix = date.get(..4)?;
    if prefix.chars().all(|c| c.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}

/// Up to three `/authors/...` keys referenced by a work.
pub fn author_keys(work: &Value) -> Vec<String> {
    work.get("authors")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("author")?.get("key")?.as_str())
                .filter(|key| key.starts_with("/authors/"))
                .take(MAX_AUTHORS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn author_name(author: &Value) -> Option<String> {
    let name = author.get("name")?.as_str()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}
