//! Raven Store — SQLite persistence of section text, keyed by identifier.

pub mod sqlite;
pub mod types;

pub use sqlite::SectionStore;
pub use types::{ReplaceReport, Section};
