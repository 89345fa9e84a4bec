//! Boolean full-text search over a relational document store.
//!
//! Queries are written once as a `QueryExpr` tree (or as query text,
//! parsed by `query::parse`), converted into a backend's native boolean
//! syntax by `QueryConverter`, and executed by `SearchEngine` against a
//! `DocumentStore`.

pub mod cli;
pub mod models;
pub mod query;
pub mod search;
pub mod server;
pub mod store;

pub use models::{Dialect, SearchHit, SearchRequest};
pub use query::{parse, QueryConverter, QueryExpr};
pub use search::{SearchEngine, SearchError, SearchResults};
