//! # NACE Classifier
//!
//! Turns the NACE Rev. 2 statistical classification (a markdown rendering
//! of the official structure) into a searchable SQLite index, and uses it
//! as retrieval context when asking a language model to classify companies.
//!
//! Parsing, validation, and segmentation live in the pure `nace-core`
//! crate; this crate adds storage, retrieval, model clients, the CLI, and
//! the HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌───────────┐
//! │  NACE .md   │──▶│  nace-core  │──▶│  SQLite   │
//! │  document   │   │ parse+check │   │ FTS5+Vec  │
//! └─────────────┘   └─────────────┘   └─────┬─────┘
//!                                           │ context
//!                                           ▼
//!                   ┌──────────┐      ┌────────────┐
//!                   │ CLI/HTTP │◀────▶│ Classifier │◀──▶ LLM
//!                   └──────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`taxonomy`] | Document reading, validate and split commands |
//! | [`ingest`] | Store parsed classes |
//! | [`scopes`] | Stored class lookup |
//! | [`industries`] | Industry labels |
//! | [`search`] | Keyword, semantic, and hybrid search |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat-completion client |
//! | [`classify`] | Company classification |
//! | [`crawl`] | Company-profile extraction |
//! | [`server`] | HTTP API |

pub mod classify;
pub mod company;
pub mod config;
pub mod crawl;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod industries;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod openai;
pub mod prompts;
pub mod scopes;
pub mod search;
pub mod server;
pub mod stats;
pub mod taxonomy;
