//! Lexis Public Interface
//!
//! Records, error types and the async service trait shared by the index
//! façade, the query evaluator and callers.

use crate::codec::CodecError;
use crate::query::QueryError;
use crate::scoring::ScoringError;
use crate::storage::StorageError;
use crate::wildcard::WildcardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Interned term surrogate, allocated from 1.
pub type TermId = u64;

/// Interned document surrogate, allocated from 1.
pub type DocId = u64;

/// Caller-supplied document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocKey {
    Int(u64),
    Str(String),
}

impl DocKey {
    pub fn is_empty(&self) -> bool {
        matches!(self, DocKey::Str(s) if s.is_empty())
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocKey::Int(n) => write!(f, "{}", n),
            DocKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for DocKey {
    fn from(n: u64) -> Self {
        DocKey::Int(n)
    }
}

impl From<&str> for DocKey {
    fn from(s: &str) -> Self {
        DocKey::Str(s.to_string())
    }
}

impl From<String> for DocKey {
    fn from(s: String) -> Self {
        DocKey::Str(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// One matching document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc: DocId,
    pub id: DocKey,
    /// The document's token stream as term ids
    pub term_ids: Vec<TermId>,
    /// The document's token stream as text
    pub terms: Vec<String>,
    /// Query terms found in the document, as ids
    pub matched_ids: Vec<TermId>,
    /// Query terms found in the document, as text
    pub matched: Vec<String>,
}

/// Result of a term search.
///
/// `ids`, `ids_to_terms` and `terms_to_ids` describe the raw postings that
/// were read, before stale documents were filtered out of `hits`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
    pub ids: Vec<DocId>,
    pub ids_to_terms: Vec<Vec<TermId>>,
    pub terms_to_ids: Vec<Vec<DocId>>,
}

impl SearchResult {
    pub fn keys(&self) -> Vec<DocKey> {
        self.hits.iter().map(|hit| hit.id.clone()).collect()
    }
}

/// Entry counts per table group and total bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub postings: u64,
    pub positions: u64,
    pub wildcards: u64,
    pub lexicon: u64,
    pub ids: u64,
    pub total: u64,
    pub size: u64,
}

/// Error type for index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Corrupt index data: {0}")]
    Codec(#[from] CodecError),
    #[error("{0}")]
    Query(#[from] QueryError),
    #[error("{0}")]
    Wildcard(#[from] WildcardError),
    #[error("{0}")]
    Scoring(#[from] ScoringError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Corrupt index data: {0}")]
    Corrupt(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The primary interface of a search index.
#[async_trait::async_trait]
pub trait IndexApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Documents containing any of `terms`, with their token streams.
    async fn search(&self, terms: &[String]) -> IndexResult<SearchResult>;

    /// Indexed terms matching a `*`/`?` pattern, in term-id order.
    async fn wildcard(&self, pattern: &str) -> IndexResult<Vec<String>>;

    /// Parse and evaluate a query string.
    async fn query(&self, query: &str) -> IndexResult<Vec<SearchHit>>;

    async fn stats(&self) -> IndexResult<IndexStats>;

    /// True when the integrity marker is missing or unreadable.
    async fn is_corrupt(&self) -> IndexResult<bool>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Index a document's token stream, replacing any previous one.
    async fn store(&self, id: DocKey, terms: &[String]) -> IndexResult<()>;

    /// Write the integrity marker.
    async fn initialize(&self) -> IndexResult<()>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────────────

    /// Caller bookkeeping value stored under `key`, if any.
    async fn metadata_get(&self, key: &str) -> IndexResult<Option<Vec<u8>>>;

    /// Store a caller bookkeeping value, replacing any previous one.
    async fn metadata_set(&self, key: &str, value: Vec<u8>) -> IndexResult<()>;

    async fn metadata_remove(&self, key: &str) -> IndexResult<()>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    async fn remove(&self, id: DocKey) -> IndexResult<()>;

    /// Drop every table's content.
    async fn clear(&self) -> IndexResult<()>;
}
