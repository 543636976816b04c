//! # Satoshi RAG
//!
//! A retrieval-augmented chat over Satoshi Nakamoto's emails, forum posts
//! and quotes, as archived by the Satoshi Nakamoto Institute.
//!
//! Three stages run one after another, each reading the previous stage's
//! finished output:
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │ Archive  │──▶│  Scraper   │──▶│    Ingestor     │──▶│  Chat stage  │
//! │  (HTTP)  │   │ item store │   │ chunk + embed   │   │ CLI / HTTP UI│
//! └──────────┘   │  (JSON)    │   │ index (SQLite)  │   │  + LLM       │
//!                └────────────┘   └─────────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! satoshi scrape                 # fetch the archive into ./data/items
//! satoshi ingest                 # build ./data/satoshi.index
//! satoshi ask "Why a 21 million cap?"
//! satoshi serve                  # chat UI on http://127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Fetch / build / query error taxonomy |
//! | [`scrape`] | Archive scraper |
//! | [`store`] | Item file store |
//! | [`chunk`] | Overlapping character windows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted vector index and search |
//! | [`ingest`] | Index build orchestration |
//! | [`llm`] | Language-model clients |
//! | [`history`] | Caller-owned conversation memory |
//! | [`prompt`] | Prompt assembly and context budget |
//! | [`chat`] | Retrieval plus generation |
//! | [`server`] | Chat UI HTTP server |
//! | [`db`] | SQLite connection for the index file |
//! | [`progress`] | Ingest progress on stderr |
//! | [`search`], [`get`], [`stats`], [`export`] | Operator tools |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod export;
pub mod get;
pub mod history;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod progress;
pub mod prompt;
pub mod scrape;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
