//! # lexctx CLI
//!
//! ```bash
//! lexctx --config ./config/lexctx.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexctx init` | Create the SQLite database and run schema migrations |
//! | `lexctx ingest <file> --user <id>` | Queue a document for a user's index |
//! | `lexctx ingest-shared <file>` | Add a document to the shared knowledge base |
//! | `lexctx status --user <id>` / `--job <id>` | Show a job status record |
//! | `lexctx search "<query>" --user <id>` | Hybrid retrieval, no language model |
//! | `lexctx context "<query>" --user <id>` | Full expand → retrieve → compress pipeline |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lexctx::{config, context, ingest, jobs, migrate, retrieve, status, telemetry};

/// Retrieval-augmented context for legal documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lexctx.example.toml`.
#[derive(Parser)]
#[command(name = "lexctx", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lexctx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest a document into a user's private index.
    ///
    /// The file is submitted to the job queue; the job id is printed
    /// immediately and the final status record once the job finishes.
    Ingest {
        /// Path to a pdf, csv, txt, doc or docx file.
        file: PathBuf,

        /// Owner of the document.
        #[arg(long)]
        user: String,

        /// Report each status transition while waiting.
        #[arg(long)]
        wait: bool,
    },

    /// Ingest a document into the shared knowledge base.
    IngestShared {
        file: PathBuf,
    },

    /// Print a job status record as JSON.
    Status {
        /// Latest job of this user.
        #[arg(long, conflicts_with = "job")]
        user: Option<String>,

        /// A specific job id.
        #[arg(long)]
        job: Option<String>,
    },

    /// Hybrid search over the shared and user indexes.
    Search {
        query: String,

        #[arg(long)]
        user: String,
    },

    /// Assemble the compressed context for a question.
    Context {
        query: String,

        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, user, wait } => {
            jobs::run_ingest(&cfg, &file, &user, wait).await?;
        }
        Commands::IngestShared { file } => {
            ingest::run_ingest_shared(&cfg, &file).await?;
        }
        Commands::Status { user, job } => {
            status::run_status(&cfg, user.as_deref(), job.as_deref()).await?;
        }
        Commands::Search { query, user } => {
            retrieve::run_search(&cfg, &query, &user).await?;
        }
        Commands::Context { query, user } => {
            context::run_context(&cfg, &query, &user).await?;
        }
    }

    Ok(())
}
