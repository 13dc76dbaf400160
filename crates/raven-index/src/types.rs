//! Data types for indexed points.

use serde::{Deserialize, Serialize};

/// One embedded chunk written into a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPoint {
    /// Identifier of the section the chunk came from.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// Embedding vector; must match the collection dimension.
    pub embedding: Vec<f32>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub source: String,
    pub text: String,
    /// Cosine similarity against the query, in [-1, 1].
    pub score: f32,
}
