//! Error types for Raven.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The corpus produced no sections after normalization. Fatal for an
    /// ingestion run.
    #[error("Malformed corpus: {0}")]
    MalformedCorpus(String),

    /// The embedding service rejected the request or kept failing after
    /// retries. Aborts the current pipeline stage; previously committed
    /// state stays live.
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// A caller-supplied deadline elapsed while waiting on a remote service.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The vector collection does not exist or cannot be reached.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The section store cannot be opened or reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A required record is missing. Lookup misses are `Ok(None)`, not this;
    /// this is for callers that require presence.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
