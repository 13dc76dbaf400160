//! Batch ingestion pipeline: normalize → segment → chunk → embed → persist
//! → index.
//!
//! All embedding happens before anything is committed. The store and the
//! index are then replaced wholesale, back to back, so a failed embed leaves
//! both on the prior run's contents.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use raven_core::Result;
use raven_embed::Embedder;
use raven_index::{IndexPoint, VectorIndex};
use raven_store::{Section, SectionStore};

use crate::chunking::TokenChunker;
use crate::normalize::normalize_document;
use crate::segment::{find_collisions, segment};

/// Texts per embedding request.
const EMBED_BATCH: usize = 64;

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub sections: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub collisions: Vec<String>,
}

/// End-to-end corpus ingestion.
pub struct Ingester {
    store: Arc<SectionStore>,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: TokenChunker,
    collection: String,
}

impl Ingester {
    pub fn new(
        store: Arc<SectionStore>,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chunker: TokenChunker,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            chunker,
            collection: collection.into(),
        }
    }

    /// Ingest an HTML corpus file from disk.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<IngestReport> {
        let path = path.as_ref();
        info!("Ingesting corpus file {}", path.display());
        let html = std::fs::read_to_string(path)?;
        self.ingest_html(&html).await
    }

    /// Ingest a raw HTML corpus.
    pub async fn ingest_html(&self, html: &str) -> Result<IngestReport> {
        let normalized = normalize_document(html)?;
        let sections = segment(&normalized);
        self.ingest_sections(sections).await
    }

    /// Ingest pre-segmented sections (the CSV import path).
    pub async fn ingest_sections(&self, sections: Vec<Section>) -> Result<IngestReport> {
        let collisions = find_collisions(&sections);
        for identifier in &collisions {
            warn!("Duplicate section identifier: {}", identifier);
        }

        let chunks = self.chunker.chunk_sections(&sections)?;
        info!(
            "Embedding {} chunks from {} sections",
            chunks.len(),
            sections.len()
        );

        let mut points = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                points.push(IndexPoint {
                    source: chunk.source.clone(),
                    text: chunk.text.clone(),
                    embedding,
                });
            }
        }
        let embedded = points.len();

        // Nothing is committed until every chunk embedded; a failed embed
        // leaves both halves on the prior run.
        self.store.replace_all(&sections)?;
        self.index
            .rebuild(&self.collection, self.embedder.dimension(), points)?;

        info!(
            "Ingestion complete: {} sections, {} chunks indexed into '{}'",
            sections.len(),
            embedded,
            self.collection
        );
        Ok(IngestReport {
            sections: sections.len(),
            chunks: embedded,
            embedded,
            collisions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Deterministic stand-in embedder: vector derived from text bytes.
    struct HashEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; self.dim];
            for (i, b) in text.bytes().enumerate() {
                v[i % self.dim] += b as f32;
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    fn test_ingester(dir: &TempDir) -> Ingester {
        let store = Arc::new(SectionStore::open(dir.path().join("store")).unwrap());
        let index = Arc::new(VectorIndex::open(dir.path().join("index")).unwrap());
        let embedder = Arc::new(HashEmbedder { dim: 8 });
        let chunker = TokenChunker::new(50, 10).unwrap();
        Ingester::new(store, index, embedder, chunker, "raven")
    }

    #[tokio::test]
    async fn test_ingest_html_end_to_end() {
        let dir = TempDir::new().unwrap();
        let ingester = test_ingester(&dir);
        let html = "<html><body>\
            <h2>Subpart X</h2>\
            <h4>Rule 1</h4><p>Staffing requirements for laboratories.</p>\
            <h4>Rule 2</h4><p>Recordkeeping requirements.</p>\
            </body></html>";
        let report = ingester.ingest_html(html).await.unwrap();
        assert_eq!(report.sections, 2);
        assert_eq!(report.chunks, 2);
        assert!(report.collisions.is_empty());

        assert!(ingester
            .store
            .lookup("Rule 1")
            .unwrap()
            .unwrap()
            .contains("Staffing requirements"));
        assert_eq!(ingester.index.size("raven").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reingest_replaces_everything() {
        let dir = TempDir::new().unwrap();
        let ingester = test_ingester(&dir);
        let first = "<html><body><h4>Old Rule</h4><p>Old body.</p></body></html>";
        let second = "<html><body><h4>New Rule</h4><p>New body.</p></body></html>";
        ingester.ingest_html(first).await.unwrap();
        ingester.ingest_html(second).await.unwrap();

        assert_eq!(ingester.store.lookup("Old Rule").unwrap(), None);
        assert!(ingester.store.lookup("New Rule").unwrap().is_some());
        assert_eq!(ingester.index.size("raven").unwrap(), 1);
    }

    /// Embedder that always fails, standing in for a dead remote service.
    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(raven_core::Error::EmbeddingService("service down".into()))
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    #[tokio::test]
    async fn test_embed_failure_leaves_prior_run_intact() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SectionStore::open(dir.path().join("store")).unwrap());
        let index = Arc::new(VectorIndex::open(dir.path().join("index")).unwrap());

        let good = Ingester::new(
            store.clone(),
            index.clone(),
            Arc::new(HashEmbedder { dim: 8 }),
            TokenChunker::new(50, 10).unwrap(),
            "raven",
        );
        good.ingest_html("<html><body><h4>Old Rule</h4><p>Old body.</p></body></html>")
            .await
            .unwrap();

        let bad = Ingester::new(
            store.clone(),
            index.clone(),
            Arc::new(DownEmbedder),
            TokenChunker::new(50, 10).unwrap(),
            "raven",
        );
        let err = bad
            .ingest_html("<html><body><h4>New Rule</h4><p>New body.</p></body></html>")
            .await
            .unwrap_err();
        assert!(matches!(err, raven_core::Error::EmbeddingService(_)));

        // Both halves still hold the previous run.
        assert!(store.lookup("Old Rule").unwrap().is_some());
        assert_eq!(store.lookup("New Rule").unwrap(), None);
        assert_eq!(index.size("raven").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_collisions_reported() {
        let dir = TempDir::new().unwrap();
        let ingester = test_ingester(&dir);
        let sections = vec![
            Section::new("Part A", "First."),
            Section::new("Part A", "Second."),
        ];
        let report = ingester.ingest_sections(sections).await.unwrap();
        assert_eq!(report.collisions, vec!["Part A".to_string()]);
    }
}
