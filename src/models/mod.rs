//! Shared data models for search requests, results, documents and
//! store configuration.
//!
//! These types form the JSON API surface used by the CLI and the
//! HTTP daemon.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::query::QueryExpr;

/// Schema version for `SearchResponse` JSON payloads.
///
/// MAJOR bumps for breaking changes to required fields, MINOR for
/// additive optional fields.
pub const SEARCH_RESPONSE_VERSION: &str = "1.0.0";

/// Native boolean full-text syntax a backend understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// `MATCH (...) AGAINST (... IN BOOLEAN MODE)`.
    #[default]
    MysqlBoolean,
    /// Lucene classic query syntax.
    Lucene,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MysqlBoolean => f.write_str("mysql-boolean"),
            Self::Lucene => f.write_str("lucene"),
        }
    }
}

/// Kind of document store implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Sqlite,
    Memory,
}

/// Configuration for opening a document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    /// Database file for the SQLite backend; ignored by the memory
    /// backend.
    pub path: PathBuf,
}

/// Result ordering requested by a caller.
///
/// Serialized as `"relevance"` or as the name of the field to order by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderBy {
    /// Backend relevance score, highest first.
    #[default]
    Relevance,
    /// A document field. Not supported by the engine; requests using it
    /// are rejected rather than silently reordered by relevance.
    Field(String),
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("order key must not be empty".to_string());
        }
        if trimmed.eq_ignore_ascii_case("relevance") {
            Ok(Self::Relevance)
        } else {
            Ok(Self::Field(trimmed.to_string()))
        }
    }
}

impl TryFrom<String> for OrderBy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderBy> for String {
    fn from(value: OrderBy) -> Self {
        match value {
            OrderBy::Relevance => "relevance".to_string(),
            OrderBy::Field(name) => name,
        }
    }
}

/// A search query, either as typed by a user or as a prebuilt tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryInput {
    Text(String),
    Expr(QueryExpr),
}

impl From<&str> for QueryInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<QueryExpr> for QueryInput {
    fn from(value: QueryExpr) -> Self {
        Self::Expr(value)
    }
}

/// Parameters of a single search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: QueryInput,
    /// Document types to search; `None` (or empty) searches every
    /// registered type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub order_by: OrderBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Rows to skip; only applied together with `limit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<QueryInput>) -> Self {
        Self {
            query: query.into(),
            models: None,
            order_by: OrderBy::Relevance,
            limit: None,
            offset: None,
        }
    }

    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A registered document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    /// Stable identifier assigned by the registry.
    pub id: i64,
    pub name: String,
}

/// A document to add to (or replace in) a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content_type: String,
    /// Identifier of the indexed object within its type.
    pub object_id: String,
    pub text: String,
}

/// Raw row returned by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
    pub id: i64,
    pub content_type_id: i64,
    pub content_type: String,
    pub object_id: String,
    pub text: String,
    /// Native relevance score; zero for rows not produced by a search.
    pub relevance: f64,
}

/// Caller-facing search result produced by the default result callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content_type: String,
    pub object_id: String,
    pub relevance: f64,
    pub text: String,
}

impl From<&DocumentRow> for SearchHit {
    fn from(row: &DocumentRow) -> Self {
        Self {
            content_type: row.content_type.clone(),
            object_id: row.object_id.clone(),
            relevance: row.relevance,
            text: row.text.clone(),
        }
    }
}

/// Serialized form of a search outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub version: String,
    pub query: QueryInput,
    /// Query as sent to the backend; empty when the search was
    /// short-circuited.
    pub native_query: String,
    /// Matches before pagination.
    pub total_count: u64,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// Request body for converting a query without running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub query: QueryInput,
    #[serde(default)]
    pub dialect: Dialect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub dialect: Dialect,
    pub native_query: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Request body for indexing documents through the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub documents: Vec<NewDocument>,
}

/// Per-type document count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub content_type: String,
    pub documents: u64,
}

/// Summary of a store's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub backend: StoreBackendKind,
    pub path: PathBuf,
    pub documents: u64,
    #[serde(default)]
    pub content_types: Vec<TypeCount>,
    /// ISO-8601 time of the most recent write, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}
