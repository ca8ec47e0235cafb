//! Command implementations behind the `docchat` binary.
//!
//! Results go to stdout; diagnostics go through `tracing` to stderr.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::chat::{create_chat_model, ChatModel};
use crate::config::Config;
use crate::credentials::ApiKey;
use crate::embedding::{create_embedding_provider, EmbeddingProvider};
use crate::index::{self, VectorIndex};
use crate::ingest::SourceBundle;
use crate::pipeline;
use crate::respond::Responder;
use crate::session::ConversationLog;

/// Inputs for `docchat process`, as given on the command line.
#[derive(Debug, Default)]
pub struct ProcessArgs {
    pub pdfs: Vec<PathBuf>,
    pub company_info: Option<String>,
    pub company_info_file: Option<PathBuf>,
    pub faqs: Vec<(String, String)>,
}

impl ProcessArgs {
    pub fn into_bundle(self) -> Result<SourceBundle> {
        let mut bundle = SourceBundle::new();
        for path in &self.pdfs {
            bundle.load_pdf(path)?;
        }

        let info = match (self.company_info, self.company_info_file) {
            (Some(_), Some(_)) => bail!("Use either --company-info or --company-info-file, not both"),
            (Some(text), None) => text,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read company info: {}", path.display()))?,
            (None, None) => String::new(),
        };
        bundle = bundle.with_company_info(info);

        for (question, answer) in self.faqs {
            bundle = bundle.with_faq(question, answer);
        }
        Ok(bundle)
    }
}

pub async fn run_process(cfg: &Config, api_key: Option<&ApiKey>, args: ProcessArgs) -> Result<()> {
    let bundle = args.into_bundle()?;
    let provider = create_embedding_provider(&cfg.embedding, api_key)?;
    let report = pipeline::process_documents(cfg, &bundle, provider.as_ref()).await?;

    println!("process");
    println!("  pdfs: {}", report.pdf_count);
    println!("  faq pairs: {}", report.faq_count);
    println!("  document chars: {}", report.document_chars);
    println!("  chunks: {}", report.index.chunk_count);
    println!("  model: {} ({} dims)", report.index.model, report.index.dims);
    println!("Documents processed successfully.");
    Ok(())
}

pub async fn run_ask(cfg: &Config, api_key: Option<&ApiKey>, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }

    // Report a missing index before complaining about credentials.
    VectorIndex::open(&cfg.index.path).await?.close().await;

    let (embedder, chat) = providers(cfg, api_key)?;
    let responder = Responder::new(
        &cfg.index.path,
        cfg.retrieval.clone(),
        embedder.as_ref(),
        chat.as_ref(),
    );

    let mut log = ConversationLog::new();
    match responder.ask(&mut log, question).await? {
        Some(answer) => println!("{}", answer),
        None => println!("(no answer)"),
    }
    Ok(())
}

/// Interactive session on stdin/stdout.
pub async fn run_chat(cfg: &Config, api_key: Option<&ApiKey>) -> Result<()> {
    let (embedder, chat) = providers(cfg, api_key)?;
    let responder = Responder::new(
        &cfg.index.path,
        cfg.retrieval.clone(),
        embedder.as_ref(),
        chat.as_ref(),
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let log = chat_loop(&responder, stdin.lock(), stdout.lock()).await?;
    tracing::info!(turns = log.len(), "chat session ended");
    Ok(())
}

/// Read questions line by line until EOF or `/quit`.
///
/// Errors for a single question are printed and the loop continues; the
/// log only ever holds completed exchanges.
pub async fn chat_loop<R: BufRead, W: Write>(
    responder: &Responder<'_>,
    input: R,
    mut output: W,
) -> Result<ConversationLog> {
    let mut log = ConversationLog::new();
    writeln!(output, "Ask a question about your documents. /history shows the conversation, /quit exits.")?;
    prompt(&mut output)?;

    for line in input.lines() {
        let line = line?;
        let question = line.trim();
        match question {
            "" => {}
            "/quit" | "/exit" => break,
            "/history" => {
                if log.is_empty() {
                    writeln!(output, "(no conversation yet)")?;
                } else {
                    write!(output, "{}", log.render())?;
                }
            }
            "/history json" => {
                writeln!(output, "{}", serde_json::to_string_pretty(&log)?)?;
            }
            _ => match responder.ask(&mut log, question).await {
                Ok(Some(answer)) => writeln!(output, "{}\n", answer)?,
                Ok(None) => writeln!(output, "(no answer)\n")?,
                Err(e) if index::is_missing_index(&e) => writeln!(output, "{}\n", e)?,
                Err(e) => writeln!(output, "Error: {:#}\n", e)?,
            },
        }
        prompt(&mut output)?;
    }

    Ok(log)
}

fn prompt<W: Write>(output: &mut W) -> Result<()> {
    write!(output, "> ")?;
    output.flush()?;
    Ok(())
}

pub async fn run_status(cfg: &Config, json: bool) -> Result<()> {
    let summary = match VectorIndex::open(&cfg.index.path).await {
        Ok(index) => {
            let summary = index.summary().clone();
            index.close().await;
            Some(summary)
        }
        Err(e) if index::is_missing_index(&e) => None,
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    match summary {
        Some(summary) => {
            println!("index: {}", cfg.index.path.display());
            println!("  generation: {}", summary.generation);
            println!("  model: {}", summary.model);
            println!("  dims: {}", summary.dims);
            println!("  chunks: {}", summary.chunk_count);
            println!("  created: {}", summary.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        None => println!("no index at {}", cfg.index.path.display()),
    }
    Ok(())
}

fn providers(
    cfg: &Config,
    api_key: Option<&ApiKey>,
) -> Result<(Box<dyn EmbeddingProvider>, Box<dyn ChatModel>)> {
    let embedder = create_embedding_provider(&cfg.embedding, api_key)?;
    let chat = create_chat_model(&cfg.chat, api_key)?;
    Ok((embedder, chat))
}
