use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn fixture_documents() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/documents.jsonl")
}

fn indexed_db() -> (TempDir, PathBuf) {
    let tmp = tempdir().expect("tempdir");
    let db = tmp.path().join("index.sqlite");

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("index")
        .arg(fixture_documents())
        .arg("--db")
        .arg(&db);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Indexed 6 documents"));

    (tmp, db)
}

fn search_json(dir: &Path, db: &Path, args: &[&str]) -> Value {
    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(dir)
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(db)
        .arg("search")
        .args(args)
        .args(["--format", "json"]);

    let assert = cmd.assert().success();
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json output")
}

fn hit_keys(value: &Value) -> Vec<String> {
    value["hits"]
        .as_array()
        .expect("hits array")
        .iter()
        .map(|hit| {
            format!(
                "{}:{}",
                hit["content_type"].as_str().unwrap_or_default(),
                hit["object_id"].as_str().unwrap_or_default()
            )
        })
        .collect()
}

#[test]
fn cli_search_ranks_matches_by_relevance() {
    let (tmp, db) = indexed_db();
    let value = search_json(tmp.path(), &db, &["rust"]);

    assert_eq!(value["version"], "1.0.0");
    assert_eq!(value["query"], "rust");
    assert_eq!(value["native_query"], "+rust");
    assert_eq!(value["total_count"], 4);
    assert_eq!(
        hit_keys(&value),
        vec!["article:1", "article:2", "note:1", "page:1"]
    );
}

#[test]
fn cli_search_restricts_document_types() {
    let (tmp, db) = indexed_db();
    let value = search_json(tmp.path(), &db, &["rust", "--type", "article,note"]);

    assert_eq!(value["total_count"], 3);
    assert_eq!(hit_keys(&value), vec!["article:1", "article:2", "note:1"]);

    let value = search_json(tmp.path(), &db, &["web", "--type", "article", "--type", "page"]);
    assert_eq!(hit_keys(&value), vec!["article:1", "article:3"]);
}

#[test]
fn cli_search_applies_negation_and_disjunction() {
    let (tmp, db) = indexed_db();

    let value = search_json(tmp.path(), &db, &["rust -unsafe"]);
    assert_eq!(value["native_query"], "+rust -unsafe");
    assert_eq!(value["total_count"], 3);
    assert!(!hit_keys(&value).contains(&"note:1".to_string()));

    let value = search_json(tmp.path(), &db, &["web (golang OR tooling)"]);
    assert_eq!(value["native_query"], "+web +(golang tooling)");
    assert_eq!(hit_keys(&value), vec!["article:3"]);

    let value = search_json(tmp.path(), &db, &["\"line tooling\""]);
    assert_eq!(hit_keys(&value), vec!["article:2"]);
}

#[test]
fn cli_search_paginates_with_full_total() {
    let (tmp, db) = indexed_db();
    let value = search_json(tmp.path(), &db, &["rust", "--limit", "2", "--offset", "1"]);

    assert_eq!(value["total_count"], 4);
    assert_eq!(hit_keys(&value), vec!["article:2", "note:1"]);
}

#[test]
fn cli_search_with_only_negated_terms_returns_nothing() {
    let (tmp, db) = indexed_db();
    let value = search_json(tmp.path(), &db, &["-rust"]);

    assert_eq!(value["native_query"], "");
    assert_eq!(value["total_count"], 0);
    assert!(value["hits"].as_array().expect("hits").is_empty());
}

#[test]
fn cli_search_text_output_lists_hits() {
    let (tmp, db) = indexed_db();

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .args(["search", "golang"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 of 1 hits for +golang"))
        .stdout(predicate::str::contains("article:3 [1.00] Golang web services"));
}

#[test]
fn cli_search_rejects_field_ordering() {
    let (tmp, db) = indexed_db();

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .args(["search", "rust", "--order-by", "title"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unsupported ordering"));
}

#[test]
fn cli_search_rejects_unknown_document_type() {
    let (tmp, db) = indexed_db();

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .args(["search", "rust", "--type", "comment"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown document type: comment"));
}

#[test]
fn cli_search_reports_unclosed_quote() {
    let (tmp, db) = indexed_db();

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .args(["search", "\"rust web"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unclosed quote"));
}

#[test]
fn cli_search_without_index_fails() {
    let tmp = tempdir().expect("tempdir");
    let db = tmp.path().join("missing.sqlite");

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .args(["search", "rust"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("index not found at"));
    assert!(!db.exists(), "search must not create the database");
}

#[test]
fn cli_search_with_unsupported_dialect_is_a_config_error() {
    let (tmp, db) = indexed_db();

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .args(["--dialect", "lucene", "search", "rust"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn cli_convert_prints_native_query_per_dialect() {
    let tmp = tempdir().expect("tempdir");

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .args(["convert", "web (rust OR golang) -unsafe"]);
    cmd.assert()
        .success()
        .stdout("+web +(rust golang) -unsafe\n");

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path()).args([
        "convert",
        "web (rust OR golang)",
        "--dialect",
        "lucene",
        "--format",
        "json",
    ]);
    let assert = cmd.assert().success();
    let value: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json output");
    assert_eq!(value["dialect"], "lucene");
    assert_eq!(value["native_query"], "+web +(rust OR golang)");
}

#[test]
fn cli_info_reports_document_counts() {
    let (tmp, db) = indexed_db();

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .args(["info", "--format", "json"]);

    let assert = cmd.assert().success();
    let value: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json output");

    assert_eq!(value["backend"], "sqlite");
    assert_eq!(value["documents"], 6);
    let types: Vec<(String, u64)> = value["content_types"]
        .as_array()
        .expect("content types")
        .iter()
        .map(|t| {
            (
                t["content_type"].as_str().unwrap_or_default().to_string(),
                t["documents"].as_u64().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        types,
        vec![
            ("article".to_string(), 3),
            ("note".to_string(), 2),
            ("page".to_string(), 1)
        ]
    );
    assert!(value["updated_at"].is_string());
}

#[test]
fn cli_reindexing_replaces_documents() {
    let (tmp, db) = indexed_db();
    let update = tmp.path().join("update.jsonl");
    std::fs::write(
        &update,
        r#"{"content_type": "article", "object_id": "3", "text": "Rust web services"}"#,
    )
    .expect("write update");

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path())
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("--db")
        .arg(&db)
        .arg("index")
        .arg(&update);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("6 documents in 3 types"));

    let value = search_json(tmp.path(), &db, &["golang"]);
    assert_eq!(value["total_count"], 0);
}
