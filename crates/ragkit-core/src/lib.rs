//! # ragkit core
//!
//! Engine logic for ragkit: content-addressed ingestion and hybrid
//! retrieval over an abstract [`store::Store`] and [`embedding::Embedder`].
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Concrete
//! stores and embedding providers live in the `ragkit` crate; an
//! in-memory store ships here for tests and embedding in-process.
//!
//! | Module | Role |
//! |--------|------|
//! | [`chunk`] | Fixed-size overlapping character windows |
//! | [`sanitize`] | Content cleanup and token estimation policies |
//! | [`hash`] | Chunk identity hash |
//! | [`embedding`] | Embedder trait and bounded batcher |
//! | [`ingest`] | Idempotent upsert pipeline |
//! | [`recency`] | Half-life decay, TTL, per-namespace weights |
//! | [`scoring`] | Dense/lexical/recency fusion |
//! | [`mmr`] | Diversified top-k selection |
//! | [`filter`] | Domain and namespace filters |
//! | [`retrieve`] | Query pipeline |

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod hash;
pub mod ingest;
pub mod mmr;
pub mod models;
pub mod recency;
pub mod retrieve;
pub mod sanitize;
pub mod scoring;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
