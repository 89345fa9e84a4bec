//! Core search entry point.
//!
//! `SearchEngine` converts a query into the store's native boolean
//! syntax, scopes it to the requested document types and runs it as a
//! single match predicate. Relevance ordering and pagination are pushed
//! down to the store.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::models::{
    Dialect, DocumentRow, OrderBy, QueryInput, SearchHit, SearchRequest, SearchResponse,
    SEARCH_RESPONSE_VERSION,
};
use crate::query::{parse, ConvertedQuery, QueryConverter, QueryError};
use crate::store::{DocumentStore, RowSlice, StoreQuery, TEXT_COLUMN};

/// Errors surfaced by `SearchEngine`.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The store cannot evaluate the configured dialect. Raised once, at
    /// construction.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("unsupported ordering {0:?}: results can only be ordered by relevance")]
    UnsupportedOrdering(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Turn text or a prebuilt tree into a native query for `dialect`.
pub fn convert_query(query: &QueryInput, dialect: Dialect) -> Result<ConvertedQuery, QueryError> {
    convert_with(&QueryConverter::for_dialect(dialect), query)
}

fn convert_with(
    converter: &QueryConverter,
    query: &QueryInput,
) -> Result<ConvertedQuery, QueryError> {
    match query {
        QueryInput::Text(text) => Ok(converter.convert(&parse(text)?)),
        QueryInput::Expr(expr) => Ok(converter.convert(expr)),
    }
}

/// Maps a raw store row to a caller-facing result.
pub type RowMapper<T> = Arc<dyn Fn(&DocumentRow) -> T + Send + Sync>;

/// Ranked rows for one search.
///
/// Rows are kept as the store returned them; the mapper runs only when
/// the results are iterated.
pub struct SearchResults<T> {
    query: QueryInput,
    native_query: String,
    rows: Vec<DocumentRow>,
    total_count: u64,
    mapper: RowMapper<T>,
}

impl<T> SearchResults<T> {
    fn empty(query: QueryInput, native_query: String, mapper: RowMapper<T>) -> Self {
        Self {
            query,
            native_query,
            rows: Vec::new(),
            total_count: 0,
            mapper,
        }
    }

    /// The query as the caller supplied it.
    pub fn query(&self) -> &QueryInput {
        &self.query
    }

    /// The query as sent to the store; empty when the search was
    /// short-circuited.
    pub fn native_query(&self) -> &str {
        &self.native_query
    }

    /// Matches before pagination.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Rows in this page.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[DocumentRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.rows.iter().map(|row| (self.mapper)(row))
    }

    pub fn to_response(&self) -> SearchResponse {
        SearchResponse {
            version: SEARCH_RESPONSE_VERSION.to_string(),
            query: self.query.clone(),
            native_query: self.native_query.clone(),
            total_count: self.total_count,
            hits: self.rows.iter().map(SearchHit::from).collect(),
        }
    }
}

impl<T> fmt::Debug for SearchResults<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResults")
            .field("query", &self.query)
            .field("native_query", &self.native_query)
            .field("rows", &self.rows)
            .field("total_count", &self.total_count)
            .finish_non_exhaustive()
    }
}

/// Runs boolean full-text searches against a document store.
pub struct SearchEngine {
    store: Box<dyn DocumentStore>,
    dialect: Dialect,
    converter: QueryConverter,
}

impl SearchEngine {
    /// Bind a store to the dialect queries are converted into.
    ///
    /// Fails when the store has no native full-text operator for
    /// `dialect`.
    pub fn new(store: Box<dyn DocumentStore>, dialect: Dialect) -> Result<Self, SearchError> {
        let capabilities = store.capabilities();
        if !capabilities.supports(dialect) {
            let native = capabilities
                .fulltext
                .map(|d| d.to_string())
                .unwrap_or_else(|| "no".to_string());
            return Err(SearchError::Config(format!(
                "{:?} store cannot evaluate {dialect} queries (native full-text support: {native})",
                capabilities.backend
            )));
        }

        Ok(Self {
            store,
            dialect,
            converter: QueryConverter::for_dialect(dialect),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn DocumentStore {
        self.store.as_mut()
    }

    /// Search, mapping each row to a `SearchHit`.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults<SearchHit>, SearchError> {
        self.search_with(request, |row: &DocumentRow| SearchHit::from(row))
    }

    /// Search, mapping each row with `mapper` as results are read.
    pub fn search_with<T, F>(
        &self,
        request: &SearchRequest,
        mapper: F,
    ) -> Result<SearchResults<T>, SearchError>
    where
        F: Fn(&DocumentRow) -> T + Send + Sync + 'static,
    {
        let mapper: RowMapper<T> = Arc::new(mapper);

        if let OrderBy::Field(field) = &request.order_by {
            return Err(SearchError::UnsupportedOrdering(field.clone()));
        }

        let converted = convert_with(&self.converter, &request.query)?;
        debug!(
            dialect = %self.dialect,
            native_query = %converted.query,
            fields = ?converted.fields,
            "converted search query"
        );

        if converted.is_empty() {
            return Ok(SearchResults::empty(
                request.query.clone(),
                String::new(),
                mapper,
            ));
        }

        let content_type_ids = self.resolve_scope(request.models.as_deref())?;
        if content_type_ids.is_empty() {
            debug!("no document types registered; skipping search");
            return Ok(SearchResults::empty(
                request.query.clone(),
                converted.query,
                mapper,
            ));
        }

        let store_query = StoreQuery {
            column: TEXT_COLUMN.to_string(),
            dialect: self.dialect,
            native_query: converted.query,
            content_type_ids,
            slice: row_slice(request.limit, request.offset),
        };
        let found = self.store.execute(&store_query)?;

        Ok(SearchResults {
            query: request.query.clone(),
            native_query: store_query.native_query,
            rows: found.rows,
            total_count: found.total,
            mapper,
        })
    }

    fn resolve_scope(&self, models: Option<&[String]>) -> Result<Vec<i64>, SearchError> {
        match models {
            None | Some([]) => Ok(self
                .store
                .indexed_types()?
                .into_iter()
                .map(|t| t.id)
                .collect()),
            Some(names) => {
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    let id = self
                        .store
                        .content_type_id(name)?
                        .ok_or_else(|| SearchError::UnknownDocumentType(name.clone()))?;
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                Ok(ids)
            }
        }
    }
}

// An offset is only honored together with a limit.
fn row_slice(limit: Option<usize>, offset: Option<usize>) -> Option<RowSlice> {
    limit.map(|limit| RowSlice {
        offset: offset.unwrap_or(0),
        limit,
    })
}
