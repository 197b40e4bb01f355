//! # Civitas CLI (`civ`)
//!
//! The `civ` binary drives ingestion, search, citation lookup, summaries,
//! and the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! civ --config ./config/civ.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `civ init` | Create the SQLite database and run schema migrations |
//! | `civ sources` | List connectors and their health |
//! | `civ sync <all\|connector>` | Ingest records from one or all connectors |
//! | `civ search "<query>"` | Search bills, opinions, and executive orders |
//! | `civ get <kind> <id>` | Show a record with summary and citations |
//! | `civ cite "<text>"` | Parse citations and resolve them against the database |
//! | `civ summarize pending` | Generate missing or stale summaries |
//! | `civ stats` | Record, citation, and sync counts |
//! | `civ serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! civ init
//! civ sync scotus
//! civ sync all --limit 100
//! civ search "clean water" --kind bill --jurisdiction ca
//! civ search "410 U.S. 113"
//! civ get opinion scotus-19-1392
//! civ cite "See Roe v. Wade, 410 U.S. 113 (1973); id. at 153."
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use civitas::config;
use civitas::ingest::{self, SyncOptions};
use civitas::search::SearchQuery;
use civitas::{citations, get, migrate, search, server, sources, stats, summarize};
use civitas_core::models::RecordKind;

/// Civitas: U.S. legislative, judicial, and executive records with
/// full-text search and citation links.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/civ.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "civ",
    about = "Civitas: search and cross-reference bills, court opinions, and executive orders",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/civ.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// List connectors and whether they are configured and healthy.
    Sources,

    /// Ingest records from a connector.
    ///
    /// Scans the connector, stores new or changed records, indexes their
    /// citations, and advances the connector's checkpoint.
    Sync {
        /// `all` or a connector name (congress, federal_register,
        /// openstates, california, scotus).
        connector: String,

        /// Ignore the checkpoint and re-process every record.
        #[arg(long)]
        full: bool,

        /// Show record counts without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of records to process per connector.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Search records by keywords or citation.
    Search {
        /// Free text, FTS5 syntax, or a citation such as `410 U.S. 113`.
        query: String,

        /// Restrict to a record kind (repeatable): bill, opinion, executive_order.
        #[arg(long = "kind")]
        kinds: Vec<RecordKind>,

        /// Restrict to a jurisdiction (`us`, `ca`, ...).
        #[arg(long)]
        jurisdiction: Option<String>,

        /// Only records updated on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        #[arg(long)]
        limit: Option<i64>,

        /// Show how each score was computed.
        #[arg(long)]
        explain: bool,
    },

    /// Show a record with its summary and citations.
    Get {
        /// bill, opinion, or executive_order.
        kind: RecordKind,
        id: String,
    },

    /// Parse legal citations in text and resolve them against the database.
    Cite { text: String },

    /// Summary management.
    Summarize {
        #[command(subcommand)]
        action: SummarizeAction,
    },

    /// Show database statistics.
    Stats,

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum SummarizeAction {
    /// Summarize records with no summary or a stale one.
    Pending {
        #[arg(long)]
        kind: Option<RecordKind>,

        #[arg(long)]
        limit: Option<usize>,

        /// Show pending counts without calling the summarizer.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("civitas=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Sync {
            connector,
            full,
            dry_run,
            limit,
        } => {
            let opts = SyncOptions {
                full,
                dry_run,
                limit,
            };
            ingest::run_sync(&cfg, &connector, &opts).await?;
        }
        Commands::Search {
            query,
            kinds,
            jurisdiction,
            since,
            limit,
            explain,
        } => {
            let q = SearchQuery {
                query,
                kinds,
                jurisdiction,
                since,
                limit,
                offset: 0,
                explain,
            };
            search::run_search(&cfg, &q).await?;
        }
        Commands::Get { kind, id } => {
            get::run_get(&cfg, kind, &id).await?;
        }
        Commands::Cite { text } => {
            citations::run_cite(&cfg, &text).await?;
        }
        Commands::Summarize { action } => match action {
            SummarizeAction::Pending {
                kind,
                limit,
                dry_run,
            } => {
                summarize::run_summarize_pending(&cfg, kind, limit, dry_run).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
