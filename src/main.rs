//! # Satoshi RAG CLI (`satoshi`)
//!
//! The `satoshi` binary runs the three pipeline stages and a few operator
//! tools around them.
//!
//! ## Usage
//!
//! ```bash
//! satoshi --config ./config/satoshi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `satoshi scrape` | Scrape the archive into the item store |
//! | `satoshi ingest` | Chunk, embed and write the vector index |
//! | `satoshi ingest --raw-only` | Write one `<id>.txt` per item instead |
//! | `satoshi ask "<question>"` | Answer one question with sources |
//! | `satoshi chat` | Interactive session with conversation memory |
//! | `satoshi serve` | Start the chat UI |
//! | `satoshi search "<query>"` | Show retrieved passages without generating |
//! | `satoshi get <id>` | Show one scraped item and its chunks |
//! | `satoshi stats` | Summarize the index |
//! | `satoshi export` | Dump index entries as JSON |
//!
//! ## Examples
//!
//! ```bash
//! satoshi scrape
//! satoshi ingest
//! satoshi ask "What did Satoshi think about proof-of-work?"
//! satoshi serve --bind 0.0.0.0:8501
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use satoshi_rag::ingest::IngestOptions;
use satoshi_rag::progress::ProgressMode;
use satoshi_rag::{chat, config, export, get, ingest, scrape, search, server, stats};

/// Satoshi RAG CLI: scrape Satoshi Nakamoto's writings, index them, and
/// answer questions with a local language model.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/satoshi.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "satoshi",
    about = "Retrieval-augmented chat over Satoshi Nakamoto's emails, forum posts and quotes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/satoshi.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every configured archive section into the item store.
    ///
    /// Pages that fail to fetch or yield no text are logged and skipped;
    /// the run continues.
    Scrape,

    /// Build the vector index from the item store.
    Ingest {
        /// Write each item as `<raw_dir>/<id>.txt` instead of building an index.
        #[arg(long)]
        raw_only: bool,

        /// Embed whole items instead of overlapping chunks.
        #[arg(long)]
        no_chunk: bool,

        /// Show item and chunk counts without embedding or writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to human when stderr is a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Answer a single question and print its sources.
    Ask {
        question: String,
    },

    /// Interactive chat on stdin. `/reset` clears the history, `exit` quits.
    Chat,

    /// Start the chat UI server.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show the passages retrieved for a query, without generating an answer.
    Search {
        query: String,

        /// Maximum number of results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a scraped item by id.
    Get {
        id: String,
    },

    /// Summarize the index.
    Stats,

    /// Export index entries (without vectors) as JSON.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Scrape => {
            scrape::run_scrape(&cfg).await?;
        }
        Commands::Ingest {
            raw_only,
            no_chunk,
            dry_run,
            progress,
        } => {
            let options = IngestOptions {
                raw_only,
                no_chunk,
                dry_run,
            };
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, options, mode).await?;
        }
        Commands::Ask { question } => {
            chat::run_ask(&cfg, &question).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id)?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
    }

    Ok(())
}
