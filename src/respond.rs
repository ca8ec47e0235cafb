//! Retrieval-augmented answering.
//!
//! For each question: open the persisted index, embed the question, take the
//! top-k most similar chunks, stuff them into [`PROMPT_TEMPLATE`], and return
//! whatever the chat model says.

use anyhow::Result;

use crate::chat::ChatModel;
use crate::config::RetrievalConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::{IndexError, VectorIndex};
use crate::models::RetrievedChunk;
use crate::session::ConversationLog;
use std::path::PathBuf;

pub const PROMPT_TEMPLATE: &str = "\
Answer the question in detail based on the provided context. Make sure to provide all the details. If the answer is not in the provided context, try to answer in the most appropriate way.

Context:
{context}

Question:
{question}

Answer:
";

/// Fill the prompt template. Chunks are separated by a blank line.
pub fn build_prompt(chunks: &[RetrievedChunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    PROMPT_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question)
}

/// Answers questions against the index at `index_path`.
pub struct Responder<'a> {
    index_path: PathBuf,
    retrieval: RetrievalConfig,
    embedder: &'a dyn EmbeddingProvider,
    chat: &'a dyn ChatModel,
}

impl<'a> Responder<'a> {
    pub fn new(
        index_path: impl Into<PathBuf>,
        retrieval: RetrievalConfig,
        embedder: &'a dyn EmbeddingProvider,
        chat: &'a dyn ChatModel,
    ) -> Self {
        Self {
            index_path: index_path.into(),
            retrieval,
            embedder,
            chat,
        }
    }

    /// Retrieve context for `question` from the current index.
    ///
    /// Fails with [`IndexError::Mismatch`] when the index was built with a
    /// different embedding model; the question is not embedded then.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let index = VectorIndex::open(&self.index_path).await?;
        let hits: Result<Vec<RetrievedChunk>> = async {
            let built_with = &index.summary().model;
            if built_with != self.embedder.model_name() {
                return Err(anyhow::Error::from(IndexError::Mismatch(format!(
                    "index was built with '{}', queries use '{}'",
                    built_with,
                    self.embedder.model_name()
                ))));
            }
            let query_vec = embedding::embed_query(self.embedder, question).await?;
            index
                .search(&query_vec, self.retrieval.top_k, self.retrieval.metric)
                .await
        }
        .await;
        index.close().await;
        hits
    }

    /// Answer one question and return the model's text verbatim.
    ///
    /// Fails with [`IndexError::Missing`](crate::index::IndexError::Missing)
    /// before any provider call when nothing has been processed yet.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let context = self.retrieve(question).await?;
        tracing::debug!(
            chunks = context.len(),
            best = context.first().map(|c| c.score),
            "retrieved context"
        );

        let prompt = build_prompt(&context, question);
        let answer = self.chat.complete(&prompt).await?;
        tracing::info!(
            model = self.chat.model_name(),
            chars = answer.chars().count(),
            "answer generated"
        );
        Ok(answer)
    }

    /// Answer and record the exchange in `log`.
    ///
    /// The log is appended to only on success with a non-empty answer, and
    /// then always with exactly two turns (user, then assistant). Blank
    /// questions are ignored. Every error leaves `log` untouched.
    pub async fn ask(&self, log: &mut ConversationLog, question: &str) -> Result<Option<String>> {
        if question.trim().is_empty() {
            return Ok(None);
        }

        let answer = self.answer(question).await?;
        if answer.trim().is_empty() {
            tracing::warn!("model returned an empty answer; nothing recorded");
            return Ok(None);
        }

        log.push_exchange(question, answer.clone());
        Ok(Some(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_index: 0,
            text: text.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_prompt_contains_context_and_question() {
        let prompt = build_prompt(
            &[hit("The warranty is 2 years."), hit("Returns within 30 days.")],
            "How long is the warranty?",
        );
        assert!(prompt.starts_with("Answer the question in detail"));
        assert!(prompt.contains(
            "Context:\nThe warranty is 2 years.\n\nReturns within 30 days.\n\nQuestion:\nHow long is the warranty?\n\nAnswer:\n"
        ));
    }

    #[test]
    fn test_prompt_with_no_context() {
        let prompt = build_prompt(&[], "Anything?");
        assert!(prompt.contains("Context:\n\n\nQuestion:\nAnything?"));
        assert!(prompt.contains("try to answer in the most appropriate way"));
    }
}
