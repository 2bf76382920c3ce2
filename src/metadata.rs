//! Book metadata resolution
//!
//! Generation only needs enough about a book to build its prompt. Metadata is
//! resolved through [`MetadataResolver`]; [`OpenLibraryResolver`] talks to the
//! Open Library API and [`CachingResolver`] keeps resolved books in sled.

pub mod cache;
pub mod openlibrary;

pub use cache::CachingResolver;
pub use openlibrary::OpenLibraryResolver;

use crate::error::ResolveError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Resolved description of a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub book_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub first_publish_year: Option<i32>,
    pub cover_url: Option<String>,
    pub openlibrary_url: String,
}

/// Looks up a book by identifier.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, book_id: &str) -> Result<BookMetadata, ResolveError>;
}
