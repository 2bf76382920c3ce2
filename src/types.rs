//! Shared identifiers: sections, cache keys, record ids.

use crate::error::{GenerationError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of content generated for a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Overview,
    KeyIdeas,
    Chapters,
    Critique,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Overview,
        Section::KeyIdeas,
        Section::Chapters,
        Section::Critique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Overview => "overview",
            Section::KeyIdeas => "key_ideas",
            Section::Chapters => "chapters",
            Section::Critique => "critique",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| GenerationError::InvalidSection(s.to_string()))
    }
}

/// Store-assigned identifier of a generation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one generation record.
///
/// Field order matters: `book_id` comes first so that the encoded key of every
/// record for a book shares the encoding of the book id as a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub book_id: String,
    pub section: Section,
    pub prompt_version: String,
    pub provider: String,
    pub model: String,
}

impl CacheKey {
    pub fn new(
        book_id: impl Into<String>,
        section: Section,
        prompt_version: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            section,
            prompt_version: prompt_version.into(),
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Deterministic byte encoding used as the storage key.
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(self).map_err(StorageError::from_bincode)
    }

    /// Key prefix shared by every record of `book_id`.
    pub fn book_prefix(book_id: &str) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(book_id).map_err(StorageError::from_bincode)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.book_id, self.section, self.prompt_version, self.provider, self.model
        )
    }
}
