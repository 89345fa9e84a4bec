//! Document storage backends.
//!
//! Documents live in a relational model: a `content_types` registry
//! and a `documents` table whose single `text` column is searched with
//! a native boolean full-text match operator. The SQLite backend
//! persists that model in a database file; the memory backend keeps
//! it in process and is mostly used by tests.

mod backend;
mod memory;
mod sqlite;

pub use backend::{
    open_store, DocumentStore, RowSlice, StoreCapabilities, StoreQuery, StoreRows, TypeRegistry,
    TEXT_COLUMN,
};
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};

use crate::models::{IndexSummary, StoreBackendKind, StoreConfig};

/// Read-only helper to inspect an existing store without creating it.
pub fn get_index_info(config: &StoreConfig) -> Result<IndexSummary> {
    if config.backend == StoreBackendKind::Sqlite {
        if !config.path.exists() {
            bail!("index not found at {}", config.path.display());
        }
        if !config.path.is_file() {
            bail!(
                "sqlite backend requires a database file; got {}",
                config.path.display()
            );
        }
    }

    let store = open_store(config)?;
    store.summary()
}

fn current_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_timestamp_iso8601(secs: u64) -> Option<String> {
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};

    let ts = secs as i64;
    let dt = OffsetDateTime::from_unix_timestamp(ts).ok()?;
    Some(dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch_as_rfc3339() {
        assert_eq!(
            format_timestamp_iso8601(0).as_deref(),
            Some("1970-01-01T00:00:00Z")
        );
    }

    #[test]
    fn info_requires_existing_sqlite_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StoreConfig {
            backend: StoreBackendKind::Sqlite,
            path: dir.path().join("missing.sqlite"),
        };
        let err = get_index_info(&config).unwrap_err();
        assert!(err.to_string().starts_with("index not found at "));
    }
}
