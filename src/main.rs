//! # NACE Classifier CLI (`nace`)
//!
//! ## Usage
//!
//! ```bash
//! nace --config ./config/nace.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nace init` | Create the SQLite database and run schema migrations |
//! | `nace ingest` | Parse, validate, and store the taxonomy document |
//! | `nace validate` | Check a taxonomy document for 615 classes |
//! | `nace split` | Write one markdown file per section |
//! | `nace get <code>` | Show one stored class |
//! | `nace scopes` | List stored classes |
//! | `nace search "<query>"` | Rank classes for a query |
//! | `nace embed pending` | Backfill missing or stale embeddings |
//! | `nace embed rebuild` | Delete and regenerate all embeddings |
//! | `nace classify` | Assign NACE codes to a company |
//! | `nace crawl <url>` | Extract a company profile from a website |
//! | `nace serve` | Start the HTTP API |
//! | `nace stats` | Show database statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nace_classifier::{
    classify, config, crawl, embed_cmd, ingest, migrate, scopes, search, server, stats, taxonomy,
};

/// NACE Rev. 2 taxonomy tooling and company classifier.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/nace.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "nace",
    about = "NACE Rev. 2 taxonomy parser, validator, and company classifier",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nace.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Parse the taxonomy document and store every class.
    Ingest {
        /// Parse and validate only; do not write to the database.
        #[arg(long)]
        dry_run: bool,

        /// Refuse to store a document that fails validation.
        #[arg(long)]
        strict: bool,
    },

    /// Parse a taxonomy document and print the validation report.
    ///
    /// Exits non-zero when the document does not yield 615 classes.
    Validate {
        /// Document to check. Defaults to `[taxonomy] document`.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Split the taxonomy document into one file per section.
    Split {
        /// Output directory. Defaults to `[taxonomy] sections_dir`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show one stored class by code (e.g. `01.11`).
    Get { class_code: String },

    /// List stored classes.
    Scopes {
        /// Case-insensitive filter on class name and descriptions.
        #[arg(long)]
        query: Option<String>,

        /// Section letter.
        #[arg(long)]
        section: Option<String>,
    },

    /// Search stored classes.
    Search {
        query: String,

        /// `keyword`, `semantic`, or `hybrid`. Defaults to `[retrieval] mode`.
        #[arg(long)]
        mode: Option<String>,

        /// Maximum number of results. Defaults to `[retrieval] top_k`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Manage embeddings.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Assign NACE class codes to a company.
    Classify {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: String,

        /// Industry label; repeat for several.
        #[arg(long = "industry")]
        industries: Vec<String>,
    },

    /// Extract a company profile from its website.
    Crawl { url: String },

    /// Start the HTTP API server.
    Serve,

    /// Show database statistics.
    Stats,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed classes that are missing or stale.
    Pending {
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long)]
        dry_run: bool,
    },
    /// Delete all embeddings and regenerate them.
    Rebuild {
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nace_classifier=info,nace_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dry_run, strict } => {
            ingest::run_ingest(&cfg, dry_run, strict).await?;
        }
        Commands::Validate { file } => {
            if !taxonomy::run_validate(&cfg, file).await? {
                std::process::exit(1);
            }
        }
        Commands::Split { out } => {
            taxonomy::run_split(&cfg, out).await?;
        }
        Commands::Get { class_code } => {
            scopes::run_get(&cfg, &class_code).await?;
        }
        Commands::Scopes { query, section } => {
            scopes::run_scopes(&cfg, query.as_deref(), section.as_deref()).await?;
        }
        Commands::Search { query, mode, limit } => {
            search::run_search(&cfg, &query, mode.as_deref(), limit).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
            EmbedAction::Rebuild { batch_size } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size).await?;
            }
        },
        Commands::Classify {
            name,
            description,
            industries,
        } => {
            classify::run_classify(&cfg, name, description, industries).await?;
        }
        Commands::Crawl { url } => {
            crawl::run_crawl(&cfg, &url).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
