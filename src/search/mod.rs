//! Search engine module.
//!
//! Hosts `SearchEngine`, used by the CLI and the HTTP daemon to run
//! converted boolean queries against a document store.

pub mod engine;

pub use engine::{convert_query, RowMapper, SearchEngine, SearchError, SearchResults};
