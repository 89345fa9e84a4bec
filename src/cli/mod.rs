use std::net::SocketAddr;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::info;

use crate::models::{ConvertResponse, SEARCH_RESPONSE_VERSION};
use crate::search::{convert_query, SearchEngine};
use crate::server::{self, ServerState};
use crate::store::{get_index_info, open_store};

mod args;
mod config;
mod format;
mod http_backend;

pub use args::{
    Cli, Commands, ConvertArgs, DialectArg, IndexArgs, InfoArgs, OutputFormat, SearchArgs,
    ServeArgs,
};

use config::{
    apply_index_config_defaults, apply_info_config_defaults, apply_search_config_defaults,
    apply_serve_config_defaults, apply_store_config_defaults, load_cli_config,
};
use http_backend::HttpSearchBackend;

/// Entry point for the CLI binary.
pub fn run() -> Result<()> {
    let mut cli = Cli::parse();

    if cli.schema_version {
        println!(
            "Search response JSON schema version: {}",
            SEARCH_RESPONSE_VERSION
        );
        return Ok(());
    }

    let cli_config = load_cli_config()?;
    if let Some(ref loaded) = cli_config {
        apply_store_config_defaults(loaded, &mut cli);
    }

    let store_config = args::store_config_from_cli(&cli);
    let dialect = args::dialect_from_cli(&cli);

    match cli.command {
        Some(Commands::Index(mut index_args)) => {
            if let Some(ref loaded) = cli_config {
                apply_index_config_defaults(loaded, &mut index_args);
            }

            let request = args::index_request_from_args(&index_args)?;
            let submitted = request.documents.len();
            let summary = if let Some(server_url) =
                effective_server_url(index_args.server.as_deref(), index_args.no_server)
            {
                let backend = HttpSearchBackend::new(server_url)?;
                backend.index(&request)?
            } else {
                let mut store = open_store(&store_config)?;
                store.index_documents(&request.documents)?;
                store.summary()?
            };

            println!(
                "Indexed {} documents; {} documents in {} types at {}",
                submitted,
                summary.documents,
                summary.content_types.len(),
                summary.path.display()
            );

            Ok(())
        }
        Some(Commands::Search(mut search_args)) => {
            if let Some(ref loaded) = cli_config {
                apply_search_config_defaults(loaded, &mut search_args);
            }

            let request = args::search_request_from_args(&search_args)?;
            let response = if let Some(server_url) =
                effective_server_url(search_args.server.as_deref(), search_args.no_server)
            {
                let backend = HttpSearchBackend::new(server_url)?;
                backend.search(&request)?
            } else {
                get_index_info(&store_config)?;
                let engine = SearchEngine::new(open_store(&store_config)?, dialect)?;
                engine.search(&request)?.to_response()
            };

            match search_args.format {
                OutputFormat::Text => format::print_search_text(&response),
                OutputFormat::Json => {
                    serde_json::to_writer(std::io::stdout(), &response)?;
                    println!();
                    Ok(())
                }
            }
        }
        Some(Commands::Convert(convert_args)) => {
            let request = args::convert_request_from_args(&convert_args, dialect);
            let converted = convert_query(&request.query, request.dialect)?;
            let response = ConvertResponse {
                dialect: request.dialect,
                native_query: converted.query,
                fields: converted.fields,
            };

            match convert_args.format {
                OutputFormat::Text => format::print_convert_text(&response),
                OutputFormat::Json => {
                    serde_json::to_writer(std::io::stdout(), &response)?;
                    println!();
                    Ok(())
                }
            }
        }
        Some(Commands::Info(mut info_args)) => {
            if let Some(ref loaded) = cli_config {
                apply_info_config_defaults(loaded, &mut info_args);
            }

            let summary = if let Some(server_url) =
                effective_server_url(info_args.server.as_deref(), info_args.no_server)
            {
                let backend = HttpSearchBackend::new(server_url)?;
                backend.info()?
            } else {
                get_index_info(&store_config)?
            };

            match info_args.format {
                OutputFormat::Text => format::print_index_summary_text(&summary),
                OutputFormat::Json => {
                    serde_json::to_writer(std::io::stdout(), &summary)?;
                    println!();
                    Ok(())
                }
            }
        }
        Some(Commands::Serve(mut serve_args)) => {
            if let Some(ref loaded) = cli_config {
                apply_serve_config_defaults(loaded, &mut serve_args);
            }

            let addr: SocketAddr = serve_args.addr.parse()?;
            println!("Starting boolsearch HTTP server on http://{addr}");
            info!(%addr, db = %store_config.path.display(), "starting server");

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            let state = ServerState {
                store: store_config,
                dialect,
            };
            runtime.block_on(server::run(addr, state))?;
            Ok(())
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn effective_server_url(server_flag: Option<&str>, no_server: bool) -> Option<String> {
    if no_server {
        None
    } else {
        server_flag.map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::effective_server_url;

    #[test]
    fn no_server_wins_over_configured_url() {
        assert_eq!(effective_server_url(Some("http://x"), true), None);
        assert_eq!(
            effective_server_url(Some("http://x"), false).as_deref(),
            Some("http://x")
        );
        assert_eq!(effective_server_url(None, false), None);
    }
}
