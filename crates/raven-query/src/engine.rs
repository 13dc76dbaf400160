//! The question-answer engine: retrieve, generate, resolve sources.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use raven_chat::{ContextPassage, GeneratedAnswer, Generator};
use raven_core::Result;
use raven_store::SectionStore;

use crate::dedup::dedup_sources;
use crate::retriever::Retriever;

/// One cited section, with its full text when the store still has it.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub identifier: String,
    /// `None` when the identifier no longer resolves in the store; the
    /// citation is kept so the caller can surface the gap.
    pub content: Option<String>,
}

/// Everything produced for one question.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: GeneratedAnswer,
    /// Distinct cited sections, best-scoring first.
    pub sources: Vec<SourceRef>,
}

/// Ties retrieval, generation, and source resolution together.
pub struct QueryEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    store: Arc<SectionStore>,
}

impl QueryEngine {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, store: Arc<SectionStore>) -> Self {
        Self {
            retriever,
            generator,
            store,
        }
    }

    /// Answer a question from the indexed corpus.
    ///
    /// Retrieved chunks go to the generator verbatim; the deduplicated
    /// section identifiers are then resolved against the store for display.
    pub async fn answer(&self, question: &str) -> Result<QueryOutcome> {
        let hits = self.retriever.retrieve(question).await?;
        let passages: Vec<ContextPassage> = hits
            .iter()
            .map(|hit| ContextPassage {
                source: hit.source.clone(),
                text: hit.text.clone(),
            })
            .collect();

        let answer = self.generator.generate(question, &passages).await?;

        let mut sources = Vec::new();
        for identifier in dedup_sources(&hits) {
            let content = self.store.lookup(&identifier)?;
            if content.is_none() {
                warn!("Cited section '{}' not found in store", identifier);
            }
            sources.push(SourceRef {
                identifier,
                content,
            });
        }

        info!(
            "Answered question with {} chunks from {} sources",
            hits.len(),
            sources.len()
        );
        Ok(QueryOutcome { answer, sources })
    }
}
