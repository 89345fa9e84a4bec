use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn fixture_documents() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/documents.jsonl")
}

fn write_config(project_root: &Path, contents: &str) {
    let config_dir = project_root.join(".boolsearch");
    fs::create_dir_all(&config_dir).expect("create .boolsearch directory");
    fs::write(config_dir.join("config.toml"), contents).expect("write config.toml");
}

fn index_fixture(cwd: &Path) {
    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(cwd)
        .env_remove("BOOLSEARCH_SERVER_URL")
        .arg("index")
        .arg(fixture_documents());
    cmd.assert().success();
}

#[test]
fn cli_uses_project_config_for_store_and_search_defaults() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    write_config(
        root,
        r#"
[store]
path = "data/docs.sqlite"

[search]
models = ["article"]
format = "json"
"#,
    );

    index_fixture(root);
    assert!(root.join("data").join("docs.sqlite").is_file());

    // Config discovery walks up from nested directories.
    let nested = root.join("src").join("deep");
    fs::create_dir_all(&nested).expect("create nested dir");

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(&nested)
        .env_remove("BOOLSEARCH_SERVER_URL")
        .args(["search", "rust"]);

    let assert = cmd.assert().success();
    let value: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json output");

    assert_eq!(value["total_count"], 2);
    for hit in value["hits"].as_array().expect("hits array") {
        assert_eq!(hit["content_type"], "article");
    }
}

#[test]
fn cli_flags_override_project_config() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    write_config(
        root,
        r#"
[search]
models = ["article"]
limit = 1
"#,
    );
    index_fixture(root);

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(root)
        .env_remove("BOOLSEARCH_SERVER_URL")
        .args([
            "search", "rust", "--type", "note", "--limit", "5", "--format", "json",
        ]);

    let assert = cmd.assert().success();
    let value: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json output");

    let hits = value["hits"].as_array().expect("hits array");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["content_type"], "note");
}

#[test]
fn cli_config_dialect_applies_to_convert() {
    let tmp = tempdir().expect("tempdir");
    write_config(
        tmp.path(),
        r#"
[store]
dialect = "lucene"
"#,
    );

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path()).args(["convert", "rust OR golang"]);
    cmd.assert().success().stdout("rust OR golang\n");
}

#[test]
fn cli_search_config_can_disable_server_even_with_env() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    write_config(
        root,
        r#"
[search]
no_server = true
format = "json"
"#,
    );
    index_fixture(root);

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(root)
        .env("BOOLSEARCH_SERVER_URL", "http://127.0.0.1:9")
        .args(["search", "golang"]);

    let assert = cmd.assert().success();
    let value: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json output");
    assert_eq!(value["total_count"], 1);
}

#[test]
fn cli_reports_invalid_config() {
    let tmp = tempdir().expect("tempdir");
    write_config(tmp.path(), "[store\npath = 1");

    let mut cmd = cargo_bin_cmd!("boolsearch");
    cmd.current_dir(tmp.path()).args(["convert", "rust"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("failed to parse TOML config"));
}
