//! In-process document store.
//!
//! Keeps the same relational model as the SQLite backend in plain
//! vectors and evaluates boolean-mode matches row by row. Each
//! `execute` call counts as one storage round trip; the counter is
//! shared through `round_trips()` so callers can observe it after the
//! store has been handed to an engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use crate::models::{
    ContentType, Dialect, DocumentRow, IndexSummary, NewDocument, StoreBackendKind, TypeCount,
};
use crate::query::BooleanQuery;
use crate::store::backend::{
    DocumentStore, StoreCapabilities, StoreQuery, StoreRows, TypeRegistry, TEXT_COLUMN,
};

pub struct MemoryDocumentStore {
    types: Vec<ContentType>,
    documents: Vec<DocumentRow>,
    next_document_id: i64,
    fulltext: Option<Dialect>,
    round_trips: Arc<AtomicUsize>,
    updated_at: Option<u64>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            documents: Vec::new(),
            next_document_id: 1,
            fulltext: Some(Dialect::MysqlBoolean),
            round_trips: Arc::new(AtomicUsize::new(0)),
            updated_at: None,
        }
    }

    /// A store that advertises no native full-text support.
    pub fn without_fulltext() -> Self {
        Self {
            fulltext: None,
            ..Self::new()
        }
    }

    /// Handle to the number of `execute` calls made so far.
    pub fn round_trips(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.round_trips)
    }

    fn ensure_type(&mut self, name: &str) -> i64 {
        if let Some(existing) = self.types.iter().find(|t| t.name == name) {
            return existing.id;
        }
        let id = self.types.len() as i64 + 1;
        self.types.push(ContentType {
            id,
            name: name.to_string(),
        });
        id
    }
}

impl TypeRegistry for MemoryDocumentStore {
    fn content_type_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.types.iter().find(|t| t.name == name).map(|t| t.id))
    }

    fn indexed_types(&self) -> Result<Vec<ContentType>> {
        Ok(self.types.clone())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn kind(&self) -> StoreBackendKind {
        StoreBackendKind::Memory
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            backend: StoreBackendKind::Memory,
            fulltext: self.fulltext,
        }
    }

    fn execute(&self, query: &StoreQuery) -> Result<StoreRows> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);

        if query.column != TEXT_COLUMN {
            bail!("documents have no full-text column named {:?}", query.column);
        }
        if self.fulltext != Some(query.dialect) {
            bail!("memory store cannot evaluate {} queries", query.dialect);
        }

        let parsed = BooleanQuery::parse(&query.native_query);
        let mut matched: Vec<DocumentRow> = self
            .documents
            .iter()
            .filter(|doc| query.content_type_ids.contains(&doc.content_type_id))
            .filter_map(|doc| {
                parsed.score(&doc.text).map(|relevance| DocumentRow {
                    relevance,
                    ..doc.clone()
                })
            })
            .collect();

        matched.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matched.len() as u64;
        let rows = match query.slice {
            Some(slice) => matched
                .into_iter()
                .skip(slice.offset)
                .take(slice.limit)
                .collect(),
            None => matched,
        };

        debug!(total, returned = rows.len(), "memory match executed");
        Ok(StoreRows { rows, total })
    }

    fn index_document(&mut self, document: &NewDocument) -> Result<DocumentRow> {
        if document.content_type.trim().is_empty() {
            bail!("document content type must not be empty");
        }

        let content_type_id = self.ensure_type(&document.content_type);
        self.updated_at = Some(super::current_epoch_seconds());

        if let Some(existing) = self.documents.iter_mut().find(|d| {
            d.content_type_id == content_type_id && d.object_id == document.object_id
        }) {
            existing.text = document.text.clone();
            return Ok(existing.clone());
        }

        let row = DocumentRow {
            id: self.next_document_id,
            content_type_id,
            content_type: document.content_type.clone(),
            object_id: document.object_id.clone(),
            text: document.text.clone(),
            relevance: 0.0,
        };
        self.next_document_id += 1;
        self.documents.push(row.clone());
        Ok(row)
    }

    fn remove_document(&mut self, content_type: &str, object_id: &str) -> Result<bool> {
        let before = self.documents.len();
        self.documents
            .retain(|d| !(d.content_type == content_type && d.object_id == object_id));
        let removed = self.documents.len() != before;
        if removed {
            self.updated_at = Some(super::current_epoch_seconds());
        }
        Ok(removed)
    }

    fn summary(&self) -> Result<IndexSummary> {
        let content_types: Vec<TypeCount> = self
            .types
            .iter()
            .map(|t| TypeCount {
                content_type: t.name.clone(),
                documents: self
                    .documents
                    .iter()
                    .filter(|d| d.content_type_id == t.id)
                    .count() as u64,
            })
            .collect();

        Ok(IndexSummary {
            backend: StoreBackendKind::Memory,
            path: ":memory:".into(),
            documents: self.documents.len() as u64,
            content_types,
            updated_at: self.updated_at.and_then(super::format_timestamp_iso8601),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RowSlice;

    fn doc(content_type: &str, object_id: &str, text: &str) -> NewDocument {
        NewDocument {
            content_type: content_type.to_string(),
            object_id: object_id.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn execute_counts_round_trips() {
        let mut store = MemoryDocumentStore::new();
        store.index_document(&doc("article", "1", "rust")).expect("index");
        let counter = store.round_trips();

        let query = StoreQuery {
            column: TEXT_COLUMN.to_string(),
            dialect: Dialect::MysqlBoolean,
            native_query: "+rust".to_string(),
            content_type_ids: vec![1],
            slice: Some(RowSlice { offset: 0, limit: 10 }),
        };
        let rows = store.execute(&query).expect("execute");

        assert_eq!(rows.total, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reindex_keeps_identity() {
        let mut store = MemoryDocumentStore::new();
        let first = store.index_document(&doc("article", "1", "old")).expect("index");
        let second = store.index_document(&doc("article", "1", "new")).expect("reindex");
        assert_eq!(first.id, second.id);
        assert_eq!(second.text, "new");
        assert_eq!(store.summary().expect("summary").documents, 1);
    }

    #[test]
    fn without_fulltext_advertises_nothing() {
        let store = MemoryDocumentStore::without_fulltext();
        assert_eq!(store.capabilities().fulltext, None);
        assert!(!store.capabilities().supports(Dialect::MysqlBoolean));
    }
}
