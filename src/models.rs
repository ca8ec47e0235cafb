//! Core data types that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A chunk of the assembled document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A question/answer pair entered alongside the documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqPair {
    pub question: String,
    pub answer: String,
}

impl FaqPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Both sides carry text. Incomplete pairs never reach the document.
    pub fn is_complete(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }
}

/// A chunk returned by a similarity query, best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faq_completeness() {
        assert!(FaqPair::new("Q1", "A1").is_complete());
        assert!(!FaqPair::new("", "A2").is_complete());
        assert!(!FaqPair::new("Q3", "  ").is_complete());
    }
}
