//! The "process documents" action: assemble → chunk → embed → replace index.

use anyhow::Result;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::index::{self, IndexSummary};
use crate::ingest::{self, SourceBundle};

/// What a processing run produced.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub document_chars: usize,
    pub pdf_count: usize,
    pub faq_count: usize,
    pub index: IndexSummary,
}

/// Build the document from `bundle` and replace the persisted index with it.
///
/// The previous index stays usable until the new one is fully written.
pub async fn process_documents(
    config: &Config,
    bundle: &SourceBundle,
    provider: &dyn EmbeddingProvider,
) -> Result<ProcessReport> {
    let document = ingest::build_document(bundle)?;
    let chunks = chunk_text(
        &document,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );
    tracing::info!(
        chars = document.chars().count(),
        chunks = chunks.len(),
        "document chunked"
    );

    let summary = index::replace_index(
        &config.index.path,
        &chunks,
        provider,
        config.embedding.batch_size,
    )
    .await?;

    Ok(ProcessReport {
        document_chars: document.chars().count(),
        pdf_count: bundle.pdfs.len(),
        faq_count: bundle.complete_faqs().len(),
        index: summary,
    })
}
