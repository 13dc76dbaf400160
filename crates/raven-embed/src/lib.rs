//! Raven Embed — text embedding behind a provider trait.

pub mod embedder;
pub mod openai;

pub use embedder::Embedder;
pub use openai::OpenAiEmbedder;
