//! Embed-and-search retrieval over one collection.

use std::sync::Arc;

use tracing::debug;

use raven_core::Result;
use raven_embed::Embedder;
use raven_index::{ScoredPoint, VectorIndex};

pub const DEFAULT_TOP_K: usize = 5;

/// Embeds a question and searches the vector index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    collection: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        collection: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            top_k,
        }
    }

    /// Retrieve the top-k chunks for a question, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredPoint>> {
        let query = self.embedder.embed(question).await?;
        let hits = self.index.query(&self.collection, &query, self.top_k)?;
        debug!(
            "Retrieved {} chunks from '{}' for question",
            hits.len(),
            self.collection
        );
        Ok(hits)
    }
}
