//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths to all Raven data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Section store database directory (`data/store/`).
    pub store: PathBuf,
    /// Vector index database directory (`data/index/`).
    pub index: PathBuf,
    /// CSV exports of segmented sections (`data/exports/`).
    pub exports: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            store: root.join("store"),
            index: root.join("index"),
            exports: root.join("exports"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.store)?;
        std::fs::create_dir_all(&self.index)?;
        std::fs::create_dir_all(&self.exports)?;
        Ok(())
    }
}

/// Top-level Raven configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RavenConfig {
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Name of the vector collection holding the corpus.
    pub collection: String,
    /// Embedding dimension (1536 for the OpenAI embedding models).
    pub embedding_dim: usize,
    /// Chunk size in model tokens.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in model tokens.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// API key; empty when unset, checked at client construction.
    pub api_key: String,
    /// Embedding model identifier.
    pub embed_model: String,
    /// Chat model identifier for answer synthesis.
    pub chat_model: String,
    /// Per-request timeout for remote calls, in seconds.
    pub request_timeout_secs: u64,
    /// Retry budget for transient embedding service failures.
    pub max_retries: usize,
}

impl RavenConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            data_paths,
            collection: env_or("RAVEN_COLLECTION", "raven"),
            embedding_dim: env_parsed("RAVEN_EMBEDDING_DIM", 1536),
            chunk_size: env_parsed("RAVEN_CHUNK_SIZE", 2000),
            chunk_overlap: env_parsed("RAVEN_CHUNK_OVERLAP", 200),
            top_k: env_parsed("RAVEN_TOP_K", 5),
            api_base: env_or("OPENAI_API_BASE", "https://api.openai.com/v1"),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            embed_model: env_or("RAVEN_EMBED_MODEL", "text-embedding-ada-002"),
            chat_model: env_or("RAVEN_CHAT_MODEL", "gpt-4"),
            request_timeout_secs: env_parsed("RAVEN_REQUEST_TIMEOUT_SECS", 30),
            max_retries: env_parsed("RAVEN_MAX_RETRIES", 3),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let dir = std::env::temp_dir().join("raven-config-test");
        let config = RavenConfig::from_env(&dir).unwrap();
        assert_eq!(config.collection, "raven");
        assert_eq!(config.embedding_dim, 1536);
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 5);
        assert!(config.data_paths.store.exists());
    }
}
