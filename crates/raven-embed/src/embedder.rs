//! Embedding provider trait.

use async_trait::async_trait;

use raven_core::Result;

/// Converts text into fixed-dimension vectors.
///
/// Implementations must return vectors of exactly [`dimension`] components;
/// the index rejects anything else at rebuild time.
///
/// [`dimension`]: Embedder::dimension
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    ///
    /// The default loops over [`embed`]; providers with a batch endpoint
    /// should override it.
    ///
    /// [`embed`]: Embedder::embed
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Number of components in every vector this provider produces.
    fn dimension(&self) -> usize;
}
