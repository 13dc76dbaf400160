//! SQLite section store: wholesale replacement on write, keyed lookup on read.
//!
//! The persisted table is the two-column `(Source, Content)` layout consumed
//! by the query path. Each ingestion run replaces the whole table in a single
//! transaction; on failure the prior contents stay untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::types::{ReplaceReport, Section};
use raven_core::{Error, Result};

const SCHEMA_SQL: &str =
    "CREATE TABLE IF NOT EXISTS regulatory_data (Source TEXT, Content TEXT)";

/// Keyed store mapping section identifier to full section text.
pub struct SectionStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SectionStore {
    /// Open or create the section store.
    ///
    /// `db_dir` is the directory (e.g., `data/store/`); the file will be
    /// `db_dir/regulatory.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let db_path = db_dir.join("regulatory.db");

        let conn =
            Connection::open(&db_path).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let count = store.count()?;
        info!(
            "SectionStore initialized: {} rows, path={}",
            count,
            store.db_path.display()
        );
        Ok(store)
    }

    /// Replace the entire persisted set in one transaction.
    ///
    /// Drop, recreate, bulk insert. Either all rows land or none do; prior
    /// data survives a failed run. Identifier collisions are reported, not
    /// rejected — the later row wins on lookup.
    pub fn replace_all(&self, sections: &[Section]) -> Result<ReplaceReport> {
        let collisions = duplicate_identifiers(sections);
        if !collisions.is_empty() {
            warn!(
                "{} section identifiers appear more than once; later writes overwrite earlier ones",
                collisions.len()
            );
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute("DROP TABLE IF EXISTS regulatory_data", [])
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(SCHEMA_SQL, [])
            .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO regulatory_data (Source, Content) VALUES (?1, ?2)")
                .map_err(|e| Error::Database(e.to_string()))?;
            for section in sections {
                stmt.execute(params![section.identifier, section.content])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        info!("Replaced section store with {} rows", sections.len());
        Ok(ReplaceReport {
            written: sections.len(),
            collisions,
        })
    }

    /// Look up the full text for a section identifier.
    ///
    /// `Ok(None)` is the valid "no cached content" outcome, not an error.
    /// When duplicate identifiers were written, the latest row wins.
    pub fn lookup(&self, identifier: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached(
                "SELECT Content FROM regulatory_data WHERE Source = ?1 \
                 ORDER BY rowid DESC LIMIT 1",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![identifier], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// Count persisted rows (duplicates included).
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM regulatory_data", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count)
    }

    /// Distinct identifiers in first-written order.
    pub fn identifiers(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT Source FROM regulatory_data GROUP BY Source ORDER BY MIN(rowid)",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// All persisted rows in write order, for export tooling.
    pub fn sections(&self) -> Result<Vec<Section>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT Source, Content FROM regulatory_data ORDER BY rowid")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Section {
                    identifier: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn duplicate_identifiers(sections: &[Section]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    let mut collisions = Vec::new();
    for section in sections {
        if !seen.insert(&section.identifier) && reported.insert(&section.identifier) {
            collisions.push(section.identifier.clone());
        }
    }
    collisions
}
