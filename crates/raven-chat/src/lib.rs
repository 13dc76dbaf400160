//! Raven Chat — grounded answer generation behind a provider trait.

pub mod openai;
pub mod types;

use async_trait::async_trait;

use raven_core::Result;
pub use openai::OpenAiGenerator;
pub use types::{ContextPassage, GeneratedAnswer};

/// Produces an answer to a question from retrieved context passages.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer grounded in `context`.
    ///
    /// The answer carries text only. The identifiers of the sections backing
    /// it come from the retrieval side: the query engine derives them from
    /// the passages it handed in and returns them alongside the answer in
    /// its outcome.
    async fn generate(
        &self,
        question: &str,
        context: &[ContextPassage],
    ) -> Result<GeneratedAnswer>;
}
