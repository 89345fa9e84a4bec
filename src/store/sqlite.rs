//! SQLite-based document store.
//!
//! Schema:
//!
//! - `meta(key TEXT PRIMARY KEY, value TEXT NOT NULL)`
//! - `content_types(id INTEGER PRIMARY KEY, name TEXT UNIQUE)`
//! - `documents(id INTEGER PRIMARY KEY, content_type_id INTEGER, object_id TEXT,
//!              text TEXT, indexed_at INTEGER, UNIQUE(content_type_id, object_id))`
//!
//! SQLite has no MySQL-style `MATCH ... AGAINST`, so the store registers
//! a deterministic scalar function `match_against(text, query)` that
//! evaluates a boolean-mode query against a column value and returns
//! its relevance, or `NULL` when the row does not match. Searches then
//! read like their MySQL counterparts:
//!
//! ```sql
//! SELECT ..., match_against(d.text, ?1) AS relevance
//! FROM documents d JOIN content_types c ON c.id = d.content_type_id
//! WHERE match_against(d.text, ?1) IS NOT NULL
//!   AND (d.content_type_id = ?2 OR d.content_type_id = ?3)
//! ORDER BY relevance DESC, d.id ASC
//! LIMIT ?4 OFFSET ?5
//! ```
//!
//! The connection is configured with `journal_mode = WAL`,
//! `synchronous = NORMAL` and a busy timeout, like other read-heavy
//! SQLite indexes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::models::{
    ContentType, Dialect, DocumentRow, IndexSummary, NewDocument, StoreBackendKind, TypeCount,
};
use crate::query::BooleanQuery;
use crate::store::backend::{
    DocumentStore, StoreCapabilities, StoreQuery, StoreRows, TypeRegistry, TEXT_COLUMN,
};

const MATCH_FUNCTION: &str = "match_against";
const SCHEMA_VERSION: &str = "1";

/// SQLite-backed implementation of `DocumentStore`.
pub struct SqliteDocumentStore {
    path: PathBuf,
    conn: Connection,
}

impl SqliteDocumentStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;

        info!(path = %path.display(), "opened sqlite document store");
        Self::with_connection(conn, path.to_path_buf())
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, path: PathBuf) -> Result<Self> {
        register_match_function(&conn)?;
        Self::initialize_schema(&conn)?;
        Ok(Self { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS content_types (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS documents (
                id              INTEGER PRIMARY KEY,
                content_type_id INTEGER NOT NULL,
                object_id       TEXT NOT NULL,
                text            TEXT NOT NULL,
                indexed_at      INTEGER NOT NULL,
                UNIQUE(content_type_id, object_id),
                FOREIGN KEY(content_type_id) REFERENCES content_types(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_documents_content_type_id
                ON documents(content_type_id);
        "#,
        )?;

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match version.as_deref() {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                    params![SCHEMA_VERSION],
                )?;
            }
            Some(SCHEMA_VERSION) => {}
            Some(other) => bail!(
                "unsupported store schema version {}; expected {}",
                other,
                SCHEMA_VERSION
            ),
        }

        Ok(())
    }

    fn touch(tx: &rusqlite::Transaction<'_>) -> Result<()> {
        let now = super::current_epoch_seconds();
        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('updated_at', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![now.to_string()],
        )?;
        Ok(())
    }

    fn load_meta(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM meta")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((key, value))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

fn register_match_function(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        MATCH_FUNCTION,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: String = ctx.get(0)?;
            let query: String = ctx.get(1)?;
            Ok(BooleanQuery::parse(&query).score(&text))
        },
    )
}

/// Build the shared `WHERE` clause and its parameters. `?1` is always
/// the native query.
fn where_clause(query: &StoreQuery) -> (String, Vec<Value>) {
    let mut params = vec![Value::Text(query.native_query.clone())];
    let type_filter: Vec<String> = query
        .content_type_ids
        .iter()
        .map(|id| {
            params.push(Value::Integer(*id));
            format!("d.content_type_id = ?{}", params.len())
        })
        .collect();

    let clause = format!(
        "{MATCH_FUNCTION}(d.{TEXT_COLUMN}, ?1) IS NOT NULL AND ({})",
        type_filter.join(" OR ")
    );
    (clause, params)
}

impl TypeRegistry for SqliteDocumentStore {
    fn content_type_id(&self, name: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM content_types WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn indexed_types(&self) -> Result<Vec<ContentType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM content_types ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(ContentType {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut types = Vec::new();
        for row in rows {
            types.push(row?);
        }
        Ok(types)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn kind(&self) -> StoreBackendKind {
        StoreBackendKind::Sqlite
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            backend: StoreBackendKind::Sqlite,
            fulltext: Some(Dialect::MysqlBoolean),
        }
    }

    fn execute(&self, query: &StoreQuery) -> Result<StoreRows> {
        if query.column != TEXT_COLUMN {
            bail!("documents have no full-text column named {:?}", query.column);
        }
        if query.dialect != Dialect::MysqlBoolean {
            bail!("sqlite store cannot evaluate {} queries", query.dialect);
        }
        if query.content_type_ids.is_empty() {
            return Ok(StoreRows::default());
        }

        let (clause, mut values) = where_clause(query);

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM documents d WHERE {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let (limit, offset) = match query.slice {
            Some(slice) => (slice.limit as i64, slice.offset as i64),
            None => (-1, 0),
        };
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));

        let sql = format!(
            "SELECT d.id, d.content_type_id, c.name, d.object_id, d.{TEXT_COLUMN},
                    {MATCH_FUNCTION}(d.{TEXT_COLUMN}, ?1) AS relevance
             FROM documents d
             JOIN content_types c ON c.id = d.content_type_id
             WHERE {clause}
             ORDER BY relevance DESC, d.id ASC
             LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mapped = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(DocumentRow {
                id: row.get(0)?,
                content_type_id: row.get(1)?,
                content_type: row.get(2)?,
                object_id: row.get(3)?,
                text: row.get(4)?,
                relevance: row.get(5)?,
            })
        })?;

        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }

        debug!(total, returned = rows.len(), "sqlite match executed");
        Ok(StoreRows {
            rows,
            total: total as u64,
        })
    }

    fn index_document(&mut self, document: &NewDocument) -> Result<DocumentRow> {
        if document.content_type.trim().is_empty() {
            bail!("document content type must not be empty");
        }

        let now = super::current_epoch_seconds() as i64;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO content_types (name) VALUES (?1)",
            params![document.content_type],
        )?;
        let content_type_id: i64 = tx.query_row(
            "SELECT id FROM content_types WHERE name = ?1",
            params![document.content_type],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO documents (content_type_id, object_id, text, indexed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(content_type_id, object_id)
             DO UPDATE SET text = excluded.text, indexed_at = excluded.indexed_at",
            params![content_type_id, document.object_id, document.text, now],
        )?;
        let id: i64 = tx.query_row(
            "SELECT id FROM documents WHERE content_type_id = ?1 AND object_id = ?2",
            params![content_type_id, document.object_id],
            |row| row.get(0),
        )?;

        Self::touch(&tx)?;
        tx.commit()?;

        Ok(DocumentRow {
            id,
            content_type_id,
            content_type: document.content_type.clone(),
            object_id: document.object_id.clone(),
            text: document.text.clone(),
            relevance: 0.0,
        })
    }

    fn remove_document(&mut self, content_type: &str, object_id: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM documents
             WHERE object_id = ?2
               AND content_type_id = (SELECT id FROM content_types WHERE name = ?1)",
            params![content_type, object_id],
        )?;
        if removed > 0 {
            Self::touch(&tx)?;
        }
        tx.commit()?;
        Ok(removed > 0)
    }

    fn summary(&self) -> Result<IndexSummary> {
        let mut stmt = self.conn.prepare(
            "SELECT c.name, COUNT(d.id)
             FROM content_types c
             LEFT JOIN documents d ON d.content_type_id = c.id
             GROUP BY c.id
             ORDER BY c.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok(TypeCount {
                content_type: name,
                documents: count as u64,
            })
        })?;

        let mut content_types = Vec::new();
        for row in rows {
            content_types.push(row?);
        }
        let documents = content_types.iter().map(|t| t.documents).sum();

        let updated_at = self
            .load_meta()?
            .get("updated_at")
            .and_then(|s| s.parse::<u64>().ok())
            .and_then(super::format_timestamp_iso8601);

        Ok(IndexSummary {
            backend: StoreBackendKind::Sqlite,
            path: self.path.clone(),
            documents,
            content_types,
            updated_at,
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

    fn query(native: &str, ids: Vec<i64>) -> StoreQuery {
        StoreQuery {
            column: TEXT_COLUMN.to_string(),
            dialect: Dialect::MysqlBoolean,
            native_query: native.to_string(),
            content_type_ids: ids,
            slice: None,
        }
    }

    fn seeded() -> SqliteDocumentStore {
        let mut store = SqliteDocumentStore::open_in_memory().expect("open");
        store
            .index_documents(&[
                doc("article", "1", "rust rust web framework"),
                doc("article", "2", "rust cli tooling"),
                doc("note", "1", "rust notes"),
                doc("note", "2", "golang notes"),
            ])
            .expect("index");
        store
    }

    #[test]
    fn registers_types_on_first_use() {
        let store = seeded();
        let types = store.indexed_types().expect("types");
        let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["article", "note"]);
        assert_eq!(store.content_type_id("note").expect("id"), Some(types[1].id));
        assert_eq!(store.content_type_id("video").expect("id"), None);
    }

    #[test]
    fn match_orders_by_relevance_and_filters_types() {
        let store = seeded();
        let article = store.content_type_id("article").expect("id").expect("article");

        let rows = store
            .execute(&query("+rust", vec![article]))
            .expect("execute");
        assert_eq!(rows.total, 2);
        let ids: Vec<&str> = rows.rows.iter().map(|r| r.object_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(rows.rows[0].relevance, 2.0);
        assert!(rows.rows.iter().all(|r| r.content_type == "article"));
    }

    #[test]
    fn total_is_independent_of_the_page() {
        let store = seeded();
        let ids = store
            .indexed_types()
            .expect("types")
            .iter()
            .map(|t| t.id)
            .collect();
        let mut q = query("+rust", ids);
        q.slice = Some(RowSlice { offset: 1, limit: 1 });

        let rows = store.execute(&q).expect("execute");
        assert_eq!(rows.total, 3);
        assert_eq!(rows.rows.len(), 1);
    }

    #[test]
    fn reindexing_replaces_text() {
        let mut store = seeded();
        store
            .index_document(&doc("note", "2", "now about rust"))
            .expect("reindex");
        let note = store.content_type_id("note").expect("id").expect("note");
        let rows = store.execute(&query("+golang", vec![note])).expect("execute");
        assert_eq!(rows.total, 0);
        assert_eq!(store.summary().expect("summary").documents, 4);
    }

    #[test]
    fn remove_document_reports_presence() {
        let mut store = seeded();
        assert!(store.remove_document("note", "1").expect("remove"));
        assert!(!store.remove_document("note", "1").expect("remove again"));
        assert!(!store.remove_document("video", "1").expect("unknown type"));
    }

    #[test]
    fn rejects_unknown_columns_and_dialects() {
        let store = seeded();
        let mut q = query("+rust", vec![1]);
        q.column = "title".to_string();
        assert!(store.execute(&q).is_err());

        let mut q = query("+rust", vec![1]);
        q.dialect = Dialect::Lucene;
        assert!(store.execute(&q).is_err());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("index.sqlite");
        {
            let mut store = SqliteDocumentStore::open(&path).expect("open");
            store.index_document(&doc("article", "1", "hello")).expect("index");
        }
        let store = SqliteDocumentStore::open(&path).expect("reopen");
        let summary = store.summary().expect("summary");
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.content_types[0].content_type, "article");
        assert!(summary.updated_at.is_some());
    }
}
