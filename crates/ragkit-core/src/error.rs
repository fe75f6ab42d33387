//! Error taxonomy for the ingestion and retrieval pipelines.
//!
//! Validation and dimension errors are surfaced as typed variants so the
//! calling layer can tell a bad request apart from a provider or store
//! outage. Collaborator failures (embedding provider, store) are carried
//! as [`anyhow::Error`] because the traits they come from use it.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document or request failed validation before any external call.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// A slot string other than `staging` or `prod`.
    #[error("Invalid slot '{0}'. Use staging or prod.")]
    InvalidSlot(String),

    /// An unknown namespace mode string.
    #[error("Invalid namespace mode '{0}'. Use strict or prefix.")]
    InvalidNamespaceMode(String),

    /// The embedder returned a vector of the wrong length (or the wrong
    /// number of vectors). `index` is the position in the caller's input.
    #[error("Embedding dimension mismatch at index {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Embedding provider error: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
