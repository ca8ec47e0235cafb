//! # docchat
//!
//! Chat with your own documents.
//!
//! docchat turns a set of PDFs, a free-text company description, and a few
//! FAQ pairs into one text document, splits it into overlapping chunks,
//! embeds them, and persists the vectors on disk. Questions are answered by
//! retrieving the most similar chunks and passing them, with the question,
//! to a hosted chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │  PDF/Info/ │──▶│ Assemble │──▶│  Chunk   │──▶│ Embed+Index │
//! │    FAQ     │   │ document │   │ (window) │   │  (SQLite)   │
//! └────────────┘   └──────────┘   └──────────┘   └──────┬──────┘
//!                                                       │ top-k
//!                              ┌──────────┐   ┌─────────▼─────┐
//!                   answer ◀───│   Chat   │◀──│ Prompt + ctx  │
//!                              └──────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export API_KEY=sk-...
//! docchat process --pdf manual.pdf --company-info "Acme sells anvils." \
//!     --faq "Do you ship abroad?=Yes, worldwide."
//! docchat ask "How long is the warranty?"
//! docchat chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`credentials`] | Provider API key |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`ingest`] | Document assembly from the three input sources |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted vector index with atomic replacement |
//! | [`chat`] | Chat model abstraction |
//! | [`respond`] | Retrieval + prompt + completion |
//! | [`session`] | Conversation log |
//! | [`pipeline`] | The "process documents" action |
//! | [`commands`] | CLI command implementations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |

pub mod chat;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod db;
pub mod embedding;
pub mod extract;
mod http;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod respond;
pub mod session;
