//! Data types for answer generation.

use serde::{Deserialize, Serialize};

/// One retrieved passage handed to the generator as grounding context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPassage {
    /// Section identifier the passage came from, cited in the prompt.
    pub source: String,
    /// Passage text.
    pub text: String,
}

/// A generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub text: String,
    /// Model that produced the answer, when the provider reports one.
    pub model: Option<String>,
}
