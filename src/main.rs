//! # Wiki Retrieval CLI (`wiki`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wiki sync` | Clone or fast-forward the local mirror |
//! | `wiki list` | List every document in the wiki |
//! | `wiki search <query>` | Print files containing any keyword |
//! | `wiki serve` | Start the HTTP tool server |
//!
//! ## Examples
//!
//! ```bash
//! wiki --config ./config/wiki.toml search lambda cold start
//! WIKI_REPO_URL=https://github.com/org/project.wiki.git wiki list
//! RUST_LOG=debug wiki serve
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wiki_retrieval::config;
use wiki_retrieval::engine::RetrievalEngine;
use wiki_retrieval::mirror::{DocumentStore, GitMirror};
use wiki_retrieval::server;

/// Keyword retrieval over a locally mirrored git wiki.
///
/// Settings come from a TOML file; `WIKI_*` environment variables override
/// it, and may replace it entirely.
#[derive(Parser)]
#[command(name = "wiki", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wiki.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone the wiki if needed, otherwise pull the latest changes.
    ///
    /// Unlike `search` and `list`, a failed sync exits non-zero.
    Sync,

    /// List every document in the wiki, one path per line.
    List,

    /// Search the wiki for files containing any of the keywords.
    Search {
        /// Keywords; matched case-insensitively, any one suffices.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Start the HTTP tool server.
    ///
    /// Binds to `[server].bind` and exposes `search_wiki` and
    /// `list_wiki_files` under `/tools`.
    Serve,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync => {
            let mut mirror = GitMirror::new(cfg.repo_location());
            let count = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
                mirror.sync().context("Failed to sync wiki")?;
                Ok(mirror.list_files()?.len())
            })
            .await??;
            println!("Wiki synced: {} documents", count);
        }
        Commands::List => {
            let engine = RetrievalEngine::new(GitMirror::new(cfg.repo_location()));
            let listing = tokio::task::spawn_blocking(move || engine.list_files()).await?;
            if !listing.is_empty() {
                println!("{}", listing);
            }
        }
        Commands::Search { query } => {
            let engine = RetrievalEngine::new(GitMirror::new(cfg.repo_location()));
            let query = query.join(" ");
            let result = tokio::task::spawn_blocking(move || engine.search(&query)).await?;
            println!("{}", result);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
