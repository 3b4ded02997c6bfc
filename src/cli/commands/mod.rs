//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod fetch;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "reviewscrape")]
#[command(about = "Rate-limited review ingestion from web APIs")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "REVIEWSCRAPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Send one paced, retrying request and print the response
    Fetch {
        /// Target URL
        url: String,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Query parameter as "key=value" (repeatable)
        #[arg(short, long = "query")]
        query: Vec<String>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
        /// Print only the response body
        #[arg(short, long)]
        body_only: bool,
    },

    /// Fetch one page of reviews for an app and append it to the output file
    Scrape {
        /// Steam app id
        app_id: u64,
        /// Page cursor returned by a previous page ("*" for the first page)
        #[arg(long, default_value = "*")]
        cursor: String,
        /// Review language filter
        #[arg(long, default_value = "all")]
        language: String,
        /// Review ordering filter (recent, updated, all)
        #[arg(long, default_value = "recent")]
        filter: String,
        /// Reviews per page (max 100)
        #[arg(long, default_value = "100")]
        per_page: u32,
        /// Output file (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
    };
    let (settings, config) = load_settings(&options).await?;

    match cli.command {
        Commands::Fetch {
            url,
            method,
            headers,
            query,
            data,
            body_only,
        } => {
            fetch::cmd_fetch(
                &settings,
                fetch::FetchArgs {
                    url,
                    method,
                    headers,
                    query,
                    data,
                    body_only,
                },
            )
            .await
        }
        Commands::Scrape {
            app_id,
            cursor,
            language,
            filter,
            per_page,
            output,
        } => {
            let query = crate::scrapers::PageQuery {
                cursor,
                filter,
                language,
                num_per_page: per_page,
            };
            scrape::cmd_scrape(&settings, app_id, query, output).await
        }
        Commands::Config => config_cmd::cmd_config_show(&settings, &config),
    }
}
