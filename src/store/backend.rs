//! Document store abstraction.
//!
//! The search engine talks to storage only through these traits: a
//! `TypeRegistry` that maps document types to stable identifiers, and
//! a `DocumentStore` that executes native full-text match predicates.

use anyhow::Result;

use crate::models::{
    ContentType, Dialect, DocumentRow, IndexSummary, NewDocument, StoreBackendKind, StoreConfig,
};

/// Name of the document column holding indexed text.
pub const TEXT_COLUMN: &str = "text";

/// What a store can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub backend: StoreBackendKind,
    /// Boolean full-text syntax understood by the store's match
    /// operator, if it has one.
    pub fulltext: Option<Dialect>,
}

impl StoreCapabilities {
    pub fn supports(&self, dialect: Dialect) -> bool {
        self.fulltext == Some(dialect)
    }
}

/// Half-open row range `[offset, offset + limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSlice {
    pub offset: usize,
    pub limit: usize,
}

/// A match predicate plus type filter, ordered by relevance descending
/// (ties broken by document id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    /// Column the match operator runs against.
    pub column: String,
    pub dialect: Dialect,
    /// Query in the store's native syntax.
    pub native_query: String,
    /// Documents must belong to one of these types. An empty list
    /// matches nothing.
    pub content_type_ids: Vec<i64>,
    /// Page to return; `None` returns every match.
    pub slice: Option<RowSlice>,
}

/// Rows for the requested page and the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRows {
    pub rows: Vec<DocumentRow>,
    pub total: u64,
}

/// Maps document types to stable identifiers.
pub trait TypeRegistry {
    /// Identifier of a registered type.
    fn content_type_id(&self, name: &str) -> Result<Option<i64>>;

    /// Every registered type, ordered by identifier.
    fn indexed_types(&self) -> Result<Vec<ContentType>>;
}

/// Relational executor for native full-text queries.
pub trait DocumentStore: TypeRegistry {
    fn kind(&self) -> StoreBackendKind;

    fn capabilities(&self) -> StoreCapabilities;

    /// Run a match predicate, returning the page of rows and the total
    /// match count (computed without pagination).
    fn execute(&self, query: &StoreQuery) -> Result<StoreRows>;

    /// Insert or replace a document, registering its type on first use.
    fn index_document(&mut self, document: &NewDocument) -> Result<DocumentRow>;

    /// Remove a document; returns whether it existed.
    fn remove_document(&mut self, content_type: &str, object_id: &str) -> Result<bool>;

    /// Aggregate counts for inspection.
    fn summary(&self) -> Result<IndexSummary>;

    fn index_documents(&mut self, documents: &[NewDocument]) -> Result<usize> {
        for document in documents {
            self.index_document(document)?;
        }
        Ok(documents.len())
    }
}

/// Helper to construct the configured backend.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn DocumentStore>> {
    match config.backend {
        StoreBackendKind::Sqlite => Ok(Box::new(crate::store::SqliteDocumentStore::open(
            &config.path,
        )?)),
        StoreBackendKind::Memory => Ok(Box::new(crate::store::MemoryDocumentStore::new())),
    }
}
