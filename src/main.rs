//! # docchat CLI
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat process` | Build (or fully replace) the index from PDFs, company info, and FAQs |
//! | `docchat ask "<question>"` | Answer one question from the index |
//! | `docchat chat` | Interactive question/answer session |
//! | `docchat status` | Show what the current index contains |
//!
//! The provider credential is read from `--api-key` or the `API_KEY`
//! environment variable. Log verbosity follows `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docchat::commands::{self, ProcessArgs};
use docchat::config;
use docchat::credentials::ApiKey;

/// docchat: ask questions about your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat: ask questions about your own documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// A missing file means built-in defaults.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    /// API key for the hosted embedding and chat providers.
    #[arg(long, global = true, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process documents into a fresh index.
    ///
    /// Extracts text from every PDF, appends the company description and
    /// FAQ pairs, chunks and embeds the result, and atomically replaces any
    /// existing index. Nothing from earlier runs is kept.
    Process {
        /// PDF file to include. Repeatable.
        #[arg(long = "pdf")]
        pdfs: Vec<PathBuf>,

        /// Free-text description of the company.
        #[arg(long, conflicts_with = "company_info_file")]
        company_info: Option<String>,

        /// Read the company description from a file.
        #[arg(long)]
        company_info_file: Option<PathBuf>,

        /// FAQ pair as `question=answer`. Repeatable, at most 5.
        #[arg(long = "faq", value_parser = parse_key_val)]
        faqs: Vec<(String, String)>,
    },

    /// Answer a single question.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Start an interactive session.
    ///
    /// Type a question per line. `/history` prints the conversation so far,
    /// `/quit` (or end of input) exits.
    Chat,

    /// Show index metadata.
    Status {
        /// Print the summary as JSON (`null` when there is no index).
        #[arg(long)]
        json: bool,
    },
}

/// Parse a `question=answer` pair. Splits on the first `=`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid QUESTION=ANSWER: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,docchat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    let api_key = cli.api_key.and_then(ApiKey::new);

    match cli.command {
        Commands::Process {
            pdfs,
            company_info,
            company_info_file,
            faqs,
        } => {
            let args = ProcessArgs {
                pdfs,
                company_info,
                company_info_file,
                faqs,
            };
            commands::run_process(&cfg, api_key.as_ref(), args).await?;
        }
        Commands::Ask { question } => {
            commands::run_ask(&cfg, api_key.as_ref(), &question).await?;
        }
        Commands::Chat => {
            commands::run_chat(&cfg, api_key.as_ref()).await?;
        }
        Commands::Status { json } => {
            commands::run_status(&cfg, json).await?;
        }
    }

    Ok(())
}
