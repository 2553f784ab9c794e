//! # RAG Harness CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the index store and collection |
//! | `rag ingest repos [SPEC...]` | Clone/pull repositories and index their files |
//! | `rag ingest docs [--dir]` | Index a directory of scraped markdown pages |
//! | `rag search "<query>"` | Profile/strategy-driven semantic search |
//! | `rag stats` | Fragment count and breakdowns |
//! | `rag clear --yes` | Drop every fragment in the collection |
//! | `rag delete-repo <name>` | Drop one repository's fragments |
//! | `rag serve` | Start the HTTP JSON API |
//! | `rag completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rag_harness::search::SearchRequest;
use rag_harness::{admin, config, ingest, search, server, sqlite_index, stats};
use rag_harness_core::store::VectorIndex;

/// RAG Harness: repository and documentation ingestion into a vector
/// index, with strategy-driven retrieval.
#[derive(Parser)]
#[command(name = "rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index store and collection. Idempotent.
    Init,

    /// Ingest repositories or documentation pages.
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Search the index.
    Search {
        /// The search query string.
        query: String,

        /// Raw results fetched before the strategy runs.
        #[arg(short = 'n', long)]
        n_results: Option<usize>,

        /// Named profile (`qa_agent`, `code_assistant`, `workflow_agent`, or configured).
        #[arg(long)]
        profile: Option<String>,

        /// Strategy override: `balanced`, `code_focused`, `workflow_focused`.
        /// Keeps the profile's category weights.
        #[arg(long)]
        strategy: Option<String>,

        /// Results kept after the strategy.
        #[arg(long)]
        limit: Option<usize>,

        /// Exact-match metadata filter, repeatable: `--where repo_name=tool`.
        #[arg(long = "where")]
        filters: Vec<String>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Drop every fragment in the collection.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Drop all fragments of one repository.
    DeleteRepo {
        /// Repository name as recorded in `repo_name`.
        name: String,
    },

    /// Start the HTTP JSON API on `[server].bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum IngestSource {
    /// Clone or pull repositories and index their files.
    ///
    /// Without arguments, uses `ingest.repos` and `ingest.repos_file`.
    Repos {
        /// Repository URLs or local paths.
        specs: Vec<String>,

        /// Categories to include (repeatable). Defaults to `ingest.include_categories`.
        #[arg(long = "category")]
        categories: Vec<String>,
    },

    /// Index every `*.md` page in a directory.
    Docs {
        /// Defaults to `ingest.docs_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "rag", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = sqlite_index::SqliteIndex::open(&cfg).await?;
            index.get_or_create().await?;
            index.close().await;
            println!(
                "Index initialized at {} (collection '{}').",
                cfg.index_path().display(),
                cfg.index.collection
            );
        }
        Commands::Ingest { source } => match source {
            IngestSource::Repos { specs, categories } => {
                ingest::run_ingest_repos(&cfg, &specs, &categories).await?;
            }
            IngestSource::Docs { dir } => {
                ingest::run_ingest_docs(&cfg, dir).await?;
            }
        },
        Commands::Search {
            query,
            n_results,
            profile,
            strategy,
            limit,
            filters,
            json,
        } => {
            let req = SearchRequest {
                query,
                n_results,
                profile,
                strategy,
                limit,
                filter: search::parse_where(&filters)?,
            };
            search::run_search(&cfg, req, json).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Clear { yes } => {
            admin::run_clear(&cfg, yes).await?;
        }
        Commands::DeleteRepo { name } => {
            admin::run_delete_repo(&cfg, &name).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
