//! Raven Query — retrieval, source deduplication, and the question-answer
//! engine.

pub mod dedup;
pub mod engine;
pub mod retriever;

pub use dedup::dedup_sources;
pub use engine::{QueryEngine, QueryOutcome, SourceRef};
pub use retriever::{Retriever, DEFAULT_TOP_K};
