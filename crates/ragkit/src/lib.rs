//! # ragkit
//!
//! **Hybrid retrieval and content-addressed ingestion for RAG backends.**
//!
//! This crate wires the storage-agnostic engine in [`ragkit_core`] to a
//! concrete stack: a TOML config file, a SQLite database (FTS5 for lexical
//! rank, BLOB columns for vectors) and HTTP embedding providers.
//!
//! ## Data Flow
//!
//! ```text
//! files ──▶ ingest ──▶ sanitize + hash ──▶ embed (changed only) ──▶ SQLite
//!                                                                    │
//! query ──▶ embed ──▶ candidates (dense + FTS5, TTL, scope) ◀────────┘
//!                          │
//!                          ▼
//!            domain filter ──▶ hybrid score ──▶ MMR ──▶ results
//! ```
//!
//! Every chunk lives under a `(namespace, slot, source_id, chunk_no)` key.
//! The `staging` and `prod` slots let a new generation of a namespace be
//! built and checked without disturbing readers of the old one.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Idempotent schema creation |
//! | [`sqlite_store`] | [`Store`](ragkit_core::store::Store) over SQLite |
//! | [`embedding`] | OpenAI, Ollama and offline hashing providers |
//! | [`ingest`] | File and directory ingestion (`ragkit ingest`) |
//! | [`search`] | Retrieval pipeline front end (`ragkit search`) |
//! | [`get`] | Chunk lookup by key (`ragkit get`) |
//! | [`purge`] | Source and generation removal (`ragkit purge`) |
//! | [`stats`] | Per namespace/slot counts (`ragkit stats`) |

pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod purge;
pub mod search;
pub mod sqlite_store;
pub mod stats;

pub use ragkit_core::{models, store};
