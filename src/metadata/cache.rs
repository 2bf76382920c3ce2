//! Sled-backed book metadata cache

use crate::error::{ResolveError, StorageError};
use crate::metadata::{BookMetadata, MetadataResolver};
use async_trait::async_trait;
use sled::Tree;
use std::sync::Arc;
use tracing::{debug, warn};

const BOOKS_TREE: &str = "books";

/// Serves books already resolved once from sled, and stores fresh
/// resolutions from the wrapped resolver. Cache faults never fail a lookup;
/// they fall through to the upstream resolver.
pub struct CachingResolver {
    books: Tree,
    upstream: Arc<dyn MetadataResolver>,
}

impl CachingResolver {
    pub fn new(db: &sled::Db, upstream: Arc<dyn MetadataResolver>) -> Result<Self, StorageError> {
        let books = db.open_tree(BOOKS_TREE).map_err(StorageError::from_sled)?;
        Ok(Self { books, upstream })
    }

    pub fn cached(&self, book_id: &str) -> Result<Option<BookMetadata>, StorageError> {
        match self.books.get(book_id.as_bytes()).map_err(StorageError::from_sled)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(StorageError::from_json)?,
            )),
            None => Ok(None),
        }
    }

    fn store(&self, book: &BookMetadata) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(book).map_err(StorageError::from_json)?;
        self.books
            .insert(book.book_id.as_bytes(), bytes)
            .map_err(StorageError::from_sled)?;
        Ok(())
    }
}

#[async_trait]
impl MetadataResolver for CachingResolver {
    async fn resolve(&self, book_id: &str) -> Result<BookMetadata, ResolveError> {
        match self.cached(book_id) {
            Ok(Some(book)) => {
                debug!(book_id, "Book metadata served from cache");
                return Ok(book);
            }
            Ok(None) => {}
            Err(e) => warn!(book_id, error = %e, "Book cache read failed"),
        }

        let book = self.upstream.resolve(book_id).await?;
        if let Err(e) = self.store(&book) {
            warn!(book_id, error = %e, "Book cache write failed");
        }
        Ok(book)
    }
}
