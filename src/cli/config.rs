use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::args::{DialectArg, OutputFormat, DEFAULT_SERVE_ADDR};
use crate::cli::{Cli, InfoArgs, IndexArgs, SearchArgs, ServeArgs};

/// Top-level representation of `.boolsearch/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub store: Option<StoreSection>,

    #[serde(default)]
    pub search: Option<SearchSection>,

    #[serde(default)]
    pub serve: Option<ServeSection>,

    #[serde(default)]
    pub http: Option<HttpSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    /// Database path, resolved against the directory holding
    /// `.boolsearch/` when relative.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub dialect: Option<DialectArg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchSection {
    #[serde(default, alias = "types")]
    pub models: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub no_server: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServeSection {
    #[serde(default)]
    pub addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpSection {
    #[serde(default)]
    pub server_url: Option<String>,
}

/// A parsed config file and the project root it was found in.
#[derive(Debug)]
pub struct LoadedConfig {
    pub root: PathBuf,
    pub config: CliConfig,
}

/// Discover and load a project-local `.boolsearch/config.toml` starting
/// from the current working directory and walking up parent
/// directories.
pub fn load_cli_config() -> Result<Option<LoadedConfig>> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;

    let Some((root, path)) = find_project_config(&cwd) else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse TOML config at {}", path.display()))?;

    Ok(Some(LoadedConfig { root, config }))
}

fn find_project_config(start: &Path) -> Option<(PathBuf, PathBuf)> {
    let mut dir = Some(start);

    while let Some(current) = dir {
        let config_toml = current.join(".boolsearch").join("config.toml");
        if config_toml.is_file() {
            return Some((current.to_path_buf(), config_toml));
        }

        dir = current.parent();
    }

    None
}

fn configured_server(loaded: &LoadedConfig) -> Option<String> {
    loaded
        .config
        .http
        .as_ref()
        .and_then(|http| http.server_url.clone())
}

pub fn apply_store_config_defaults(loaded: &LoadedConfig, cli: &mut Cli) {
    let Some(store) = &loaded.config.store else {
        return;
    };

    if cli.db.is_none() {
        if let Some(path) = &store.path {
            cli.db = Some(if path.is_absolute() {
                path.clone()
            } else {
                loaded.root.join(path)
            });
        }
    }

    if cli.dialect.is_none() {
        cli.dialect = store.dialect;
    }
}

pub fn apply_search_config_defaults(loaded: &LoadedConfig, args: &mut SearchArgs) {
    if let Some(search) = &loaded.config.search {
        if args.types.is_empty() && !search.models.is_empty() {
            args.types = search.models.clone();
        }

        if args.limit.is_none() {
            args.limit = search.limit;
        }

        if matches!(args.format, OutputFormat::Text) {
            if let Some(format) = search.format {
                args.format = format;
            }
        }

        if args.server.is_none() {
            args.server = search.server.clone().or_else(|| configured_server(loaded));
        }

        if !args.no_server {
            if let Some(true) = search.no_server {
                args.no_server = true;
            }
        }
    } else if args.server.is_none() {
        args.server = configured_server(loaded);
    }
}

pub fn apply_index_config_defaults(loaded: &LoadedConfig, args: &mut IndexArgs) {
    if args.server.is_none() {
        args.server = configured_server(loaded);
    }
}

pub fn apply_info_config_defaults(loaded: &LoadedConfig, args: &mut InfoArgs) {
    if args.server.is_none() {
        args.server = configured_server(loaded);
    }
}

pub fn apply_serve_config_defaults(loaded: &LoadedConfig, args: &mut ServeArgs) {
    if let Some(serve) = &loaded.config.serve {
        if args.addr == DEFAULT_SERVE_ADDR {
            if let Some(addr) = &serve.addr {
                args.addr = addr.clone();
            }
        }
    }
}
