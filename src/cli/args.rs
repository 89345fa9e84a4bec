use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::models::{
    ConvertRequest, Dialect, IndexRequest, NewDocument, OrderBy, SearchRequest, StoreBackendKind,
    StoreConfig,
};

/// Default location of the document database, relative to the working
/// directory.
pub const DEFAULT_DB_PATH: &str = ".boolsearch/index.sqlite";

/// Default bind address for `serve`.
pub const DEFAULT_SERVE_ADDR: &str = "127.0.0.1:7878";

/// Top-level CLI entrypoint for `boolsearch`.
#[derive(Parser, Debug)]
#[command(
    name = "boolsearch",
    about = "Boolean full-text search over a relational document store",
    author = "boolsearch developers",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    /// Print the JSON schema version used for `--format=json` search
    /// output and exit.
    #[arg(long = "schema-version")]
    pub schema_version: bool,

    /// Path to the SQLite document database.
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    /// Native query dialect to convert into.
    #[arg(long = "dialect", value_enum, global = true)]
    pub dialect: Option<DialectArg>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add or replace documents from a JSON Lines file.
    Index(IndexArgs),
    /// Search indexed documents.
    Search(SearchArgs),
    /// Print the native form of a query without running it.
    Convert(ConvertArgs),
    /// Inspect an existing index without modifying it.
    Info(InfoArgs),
    /// Run a long-lived HTTP+JSON daemon.
    Serve(ServeArgs),
}

/// Arguments specific to the `index` subcommand.
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// JSON Lines file with one `{"content_type", "object_id", "text"}`
    /// object per line.
    pub file: PathBuf,

    /// Optional server URL for delegating indexing to a daemon.
    #[arg(long = "server", env = "BOOLSEARCH_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local indexing.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `search` subcommand.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query, e.g. `rust -unsafe "error handling" (web OR cli)`.
    pub query: String,

    /// Restrict the search to these document types. Repeat the flag or
    /// separate with commas.
    #[arg(short = 't', long = "type", value_delimiter = ',')]
    pub types: Vec<String>,

    /// Maximum number of hits to return.
    #[arg(long = "limit")]
    pub limit: Option<usize>,

    /// Hits to skip before the first returned one. Only applied
    /// together with `--limit`.
    #[arg(long = "offset")]
    pub offset: Option<usize>,

    /// Result ordering. Only `relevance` is supported.
    #[arg(long = "order-by")]
    pub order_by: Option<String>,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating search to a daemon.
    ///
    /// When set (either via this flag or the `BOOLSEARCH_SERVER_URL`
    /// environment variable), the CLI sends the request to the HTTP
    /// server instead of running a local search. Use `--no-server` to
    /// override this and force local execution.
    #[arg(long = "server", env = "BOOLSEARCH_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local search.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Query to convert.
    pub query: String,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments specific to the `info` subcommand.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating index introspection to a daemon.
    #[arg(long = "server", env = "BOOLSEARCH_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force local introspection.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

/// Arguments specific to the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to, e.g. "127.0.0.1:7878".
    #[arg(long = "addr", default_value = DEFAULT_SERVE_ADDR)]
    pub addr: String,
}

/// CLI representation of output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// CLI representation of the native query dialect.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialectArg {
    MysqlBoolean,
    Lucene,
}

impl DialectArg {
    pub fn to_model(self) -> Dialect {
        match self {
            DialectArg::MysqlBoolean => Dialect::MysqlBoolean,
            DialectArg::Lucene => Dialect::Lucene,
        }
    }
}

/// Build the SQLite `StoreConfig` selected by the global `--db` flag.
pub fn store_config_from_cli(cli: &Cli) -> StoreConfig {
    StoreConfig {
        backend: StoreBackendKind::Sqlite,
        path: cli
            .db
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
    }
}

pub fn dialect_from_cli(cli: &Cli) -> Dialect {
    cli.dialect.map(DialectArg::to_model).unwrap_or_default()
}

/// Build a `SearchRequest` from CLI `SearchArgs`.
pub fn search_request_from_args(args: &SearchArgs) -> Result<SearchRequest> {
    let order_by = match &args.order_by {
        Some(key) => key
            .parse::<OrderBy>()
            .map_err(|err| anyhow!("invalid --order-by: {err}"))?,
        None => OrderBy::Relevance,
    };

    let types: Vec<String> = args
        .types
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(SearchRequest {
        query: args.query.clone().into(),
        models: if types.is_empty() { None } else { Some(types) },
        order_by,
        limit: args.limit,
        offset: args.offset,
    })
}

pub fn convert_request_from_args(args: &ConvertArgs, dialect: Dialect) -> ConvertRequest {
    ConvertRequest {
        query: args.query.clone().into(),
        dialect,
    }
}

/// Build an `IndexRequest` from the JSON Lines file named by `IndexArgs`.
pub fn index_request_from_args(args: &IndexArgs) -> Result<IndexRequest> {
    Ok(IndexRequest {
        documents: read_documents(&args.file)?,
    })
}

fn read_documents(path: &Path) -> Result<Vec<NewDocument>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open documents file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut documents = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let document: NewDocument = serde_json::from_str(&line).with_context(|| {
            format!("invalid document on line {} of {}", idx + 1, path.display())
        })?;
        documents.push(document);
    }

    Ok(documents)
}
