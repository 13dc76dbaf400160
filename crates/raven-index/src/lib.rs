//! Raven Index — persistent vector collections with in-memory cosine search.

pub mod index;
pub mod types;

pub use index::VectorIndex;
pub use types::{IndexPoint, ScoredPoint};
