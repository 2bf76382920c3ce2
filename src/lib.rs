//! Bookwise: single-flight generation of LLM book insights
//!
//! Each (book, section, prompt version, provider, model) cache key is
//! generated at most once across concurrent callers and processes. Records
//! persist in a sled store; later requests are served from it.

pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod generation;
pub mod logging;
pub mod metadata;
pub mod prompt;
pub mod provider;
pub mod store;
pub mod telemetry;
pub mod types;

pub use error::{ApiError, GenerationError};
pub use generation::{GenerationOutcome, GenerationService, ServiceSettings};
pub use types::{CacheKey, RecordId, Section};
