//! Data types for persisted sections.

use serde::{Deserialize, Serialize};

/// One retrievable unit of regulatory text, keyed by a heading-derived
/// identifier.
///
/// Identifiers are unique per corpus version by convention only; the store
/// applies last-write-wins when they collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text the section was split on.
    pub identifier: String,
    /// Normalized plain-text body. Never empty after trimming; empty pieces
    /// are dropped by the segmenter and never reach the store.
    pub content: String,
}

impl Section {
    pub fn new(identifier: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            content: content.into(),
        }
    }
}

/// Outcome of a full store replacement.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaceReport {
    /// Number of rows written, counting all duplicates.
    pub written: usize,
    /// Identifiers that appeared more than once in the input; for these,
    /// later rows shadow earlier ones on lookup.
    pub collisions: Vec<String>,
}
