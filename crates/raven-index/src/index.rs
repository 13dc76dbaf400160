//! SQLite-backed vector index with an in-memory cosine search matrix.
//!
//! Each collection is held in memory as a row-normalized `Array2<f32>` so a
//! query is one matrix-vector product. SQLite is the durable copy: rebuilds
//! write through in a single transaction, then swap the in-memory collection
//! behind an `Arc` so readers never observe a half-built state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array1, Array2};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::types::{IndexPoint, ScoredPoint};
use raven_core::{Error, Result};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dim  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS points (
    collection TEXT NOT NULL,
    ord        INTEGER NOT NULL,
    source     TEXT NOT NULL,
    text       TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    PRIMARY KEY (collection, ord)
);
";

/// One fully-built collection: normalized vectors plus per-row metadata.
struct Collection {
    dim: usize,
    /// Row-normalized embeddings, one row per point.
    matrix: Array2<f32>,
    /// `(source, text)` per matrix row.
    meta: Vec<(String, String)>,
}

/// Persistent vector index over named collections.
pub struct VectorIndex {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl VectorIndex {
    /// Open or create the index under `db_dir`, loading any persisted
    /// collections into memory.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        let db_path = db_dir.join("vectors.db");

        let conn =
            Connection::open(&db_path).map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let index = Self {
            conn: Mutex::new(conn),
            db_path,
            collections: RwLock::new(HashMap::new()),
        };
        index.load_all()?;

        let loaded = index.collections.read().len();
        info!(
            "VectorIndex initialized: {} collections, path={}",
            loaded,
            index.db_path.display()
        );
        Ok(index)
    }

    fn load_all(&self) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name, dim FROM collections")
            .map_err(|e| Error::Database(e.to_string()))?;
        let named: Vec<(String, usize)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        let mut loaded = HashMap::new();
        for (name, dim) in named {
            let mut stmt = conn
                .prepare(
                    "SELECT source, text, embedding FROM points \
                     WHERE collection = ?1 ORDER BY ord",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            let rows: Vec<(String, String, Vec<u8>)> = stmt
                .query_map(params![name], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .map_err(|e| Error::Database(e.to_string()))?
                .filter_map(|r| r.ok())
                .collect();

            let points: Vec<IndexPoint> = rows
                .into_iter()
                .map(|(source, text, blob)| IndexPoint {
                    source,
                    text,
                    embedding: blob_to_vec(&blob),
                })
                .collect();
            let collection = build_collection(dim, &points)?;
            debug!("Loaded collection '{}' ({} points)", name, points.len());
            loaded.insert(name, Arc::new(collection));
        }
        *self.collections.write() = loaded;
        Ok(())
    }

    /// Replace a collection wholesale.
    ///
    /// The new contents are persisted in one transaction and the in-memory
    /// matrix is swapped only after the commit succeeds; a failed rebuild
    /// leaves the previous collection fully queryable.
    pub fn rebuild(&self, name: &str, dim: usize, points: Vec<IndexPoint>) -> Result<()> {
        let collection = build_collection(dim, &points)?;

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute("DELETE FROM points WHERE collection = ?1", params![name])
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(
            "INSERT INTO collections (name, dim) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET dim = ?2",
            params![name, dim as i64],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO points (collection, ord, source, text, embedding) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (ord, point) in points.iter().enumerate() {
                stmt.execute(params![
                    name,
                    ord as i64,
                    point.source,
                    point.text,
                    vec_to_blob(&point.embedding)
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        info!("Rebuilt collection '{}' with {} points", name, points.len());
        self.collections
            .write()
            .insert(name.to_string(), Arc::new(collection));
        Ok(())
    }

    /// Cosine search over a collection.
    ///
    /// Results come back in descending score order, ties in insertion order,
    /// at most `k` of them.
    pub fn query(&self, name: &str, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let collection = self
            .collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::IndexUnavailable(format!("unknown collection '{}'", name)))?;

        if query.len() != collection.dim {
            return Err(Error::Internal(format!(
                "query dimension {} does not match collection dimension {}",
                query.len(),
                collection.dim
            )));
        }
        if collection.meta.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let q = normalize(Array1::from_vec(query.to_vec()));
        let scores = collection.matrix.dot(&q);

        let mut hits: Vec<ScoredPoint> = scores
            .iter()
            .zip(&collection.meta)
            .map(|(&score, (source, text))| ScoredPoint {
                source: source.clone(),
                text: text.clone(),
                score,
            })
            .collect();
        // Stable sort keeps insertion order on equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Number of points in a collection, zero if it does not exist.
    pub fn size(&self, name: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .get(name)
            .map(|c| c.meta.len())
            .unwrap_or(0))
    }

    /// Drop a collection from memory and disk.
    pub fn delete_collection(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM points WHERE collection = ?1", params![name])
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute("DELETE FROM collections WHERE name = ?1", params![name])
            .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);
        self.collections.write().remove(name);
        info!("Deleted collection '{}'", name);
        Ok(())
    }
}

fn build_collection(dim: usize, points: &[IndexPoint]) -> Result<Collection> {
    if dim == 0 {
        return Err(Error::Internal("collection dimension must be positive".into()));
    }
    let mut matrix = Array2::<f32>::zeros((points.len(), dim));
    let mut meta = Vec::with_capacity(points.len());
    for (i, point) in points.iter().enumerate() {
        if point.embedding.len() != dim {
            return Err(Error::Internal(format!(
                "point {} has dimension {}, collection expects {}",
                i,
                point.embedding.len(),
                dim
            )));
        }
        let row = normalize(Array1::from_vec(point.embedding.clone()));
        matrix.row_mut(i).assign(&row);
        meta.push((point.source.clone(), point.text.clone()));
    }
    Ok(Collection { dim, matrix, meta })
}

fn normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}

fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(v.len() * 4);
    for x in v {
        blob.extend_from_slice(&x.to_le_bytes());
    }
    blob
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn point(source: &str, text: &str, embedding: Vec<f32>) -> IndexPoint {
        IndexPoint {
            source: source.into(),
            text: text.into(),
            embedding,
        }
    }

    #[test]
    fn test_rebuild_and_query_ordering() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        index
            .rebuild(
                "raven",
                3,
                vec![
                    point("A", "alpha", vec![1.0, 0.0, 0.0]),
                    point("B", "beta", vec![0.0, 1.0, 0.0]),
                    point("C", "gamma", vec![0.7, 0.7, 0.0]),
                ],
            )
            .unwrap();

        let hits = index.query("raven", &[1.0, 0.1, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "A");
        assert_eq!(hits[1].source, "C");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        index
            .rebuild(
                "raven",
                2,
                vec![
                    point("first", "t", vec![1.0, 0.0]),
                    point("second", "t", vec![2.0, 0.0]),
                ],
            )
            .unwrap();

        // Both rows normalize to the same vector, so scores tie exactly.
        let hits = index.query("raven", &[1.0, 0.0], 5).unwrap();
        assert_eq!(hits[0].source, "first");
        assert_eq!(hits[1].source, "second");
    }

    #[test]
    fn test_rebuild_replaces_wholesale() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        index
            .rebuild("raven", 2, vec![point("old", "o", vec![1.0, 0.0])])
            .unwrap();
        index
            .rebuild("raven", 2, vec![point("new", "n", vec![0.0, 1.0])])
            .unwrap();

        assert_eq!(index.size("raven").unwrap(), 1);
        let hits = index.query("raven", &[0.0, 1.0], 5).unwrap();
        assert_eq!(hits[0].source, "new");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let index = VectorIndex::open(dir.path()).unwrap();
            index
                .rebuild("raven", 2, vec![point("A", "alpha", vec![0.6, 0.8])])
                .unwrap();
        }
        let reopened = VectorIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.size("raven").unwrap(), 1);
        let hits = reopened.query("raven", &[0.6, 0.8], 1).unwrap();
        assert_eq!(hits[0].source, "A");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_collection_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        let err = index.query("missing", &[1.0], 1).unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        let err = index
            .rebuild("raven", 3, vec![point("A", "a", vec![1.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_delete_collection() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        index
            .rebuild("raven", 2, vec![point("A", "a", vec![1.0, 0.0])])
            .unwrap();
        index.delete_collection("raven").unwrap();
        assert_eq!(index.size("raven").unwrap(), 0);
        assert!(index.query("raven", &[1.0, 0.0], 1).is_err());
    }
}
