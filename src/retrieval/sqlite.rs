//! `SQLite` FTS5 passage index.
//!
//! Passages are stored in a plain table with an external-content FTS5 table
//! on top. Search ranks with BM25 and reports the negated rank as the
//! relevance score so that higher is better.

use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use super::Retriever;
use crate::core::Passage;
use crate::error::RetrievalError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS passages (
    id INTEGER PRIMARY KEY,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    page INTEGER,
    chapter TEXT,
    section TEXT,
    chunk_index INTEGER,
    total_chunks INTEGER
);
CREATE VIRTUAL TABLE IF NOT EXISTS passages_fts USING fts5(
    content,
    content = 'passages',
    content_rowid = 'id'
);
";

const SEARCH_SQL: &str = r"
SELECT p.content, p.source, p.page, p.chapter, p.section,
       p.chunk_index, p.total_chunks, bm25(passages_fts) AS rank
FROM passages_fts
JOIN passages p ON p.id = passages_fts.rowid
WHERE passages_fts MATCH ?1
ORDER BY rank
LIMIT ?2
";

/// Passage and source counts for an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Indexed passages.
    pub passages: usize,
    /// Distinct sources.
    pub sources: usize,
}

/// FTS5-backed [`Retriever`].
///
/// The connection sits behind a mutex and searches run on the blocking
/// pool, since `rusqlite::Connection` is `!Sync`.
pub struct SqliteRetriever {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRetriever {
    /// Opens (and if needed creates) an index at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Self, RetrievalError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self, RetrievalError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RetrievalError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Inserts passages in one transaction, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] on database failure; nothing is written.
    pub fn insert(&self, passages: &[Passage]) -> Result<usize, RetrievalError> {
        let mut conn = self.conn.lock().map_err(|_| RetrievalError::Poisoned)?;
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO passages (content, source, page, chapter, section, chunk_index, total_chunks)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut insert_fts =
                tx.prepare("INSERT INTO passages_fts (rowid, content) VALUES (?1, ?2)")?;
            for p in passages {
                insert.execute(params![
                    p.content,
                    p.source,
                    p.page,
                    p.chapter,
                    p.section,
                    p.chunk_index,
                    p.total_chunks,
                ])?;
                let rowid = tx.last_insert_rowid();
                insert_fts.execute(params![rowid, p.content])?;
            }
        }
        tx.commit()?;
        Ok(passages.len())
    }

    /// Imports JSON-lines passage records from `reader`.
    ///
    /// Blank lines are skipped. The whole import is rejected if any line
    /// fails to decode.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidRecord`] naming the first bad line.
    pub fn import_jsonl(&self, reader: impl BufRead) -> Result<usize, RetrievalError> {
        let mut passages = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let passage: Passage =
                serde_json::from_str(&line).map_err(|e| RetrievalError::InvalidRecord {
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            passages.push(passage);
        }
        self.insert(&passages)
    }

    /// Returns passage and source counts.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] on database failure.
    pub fn stats(&self) -> Result<IndexStats, RetrievalError> {
        let conn = self.conn.lock().map_err(|_| RetrievalError::Poisoned)?;
        let (passages, sources): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT source) FROM passages",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .unwrap_or((0, 0));
        Ok(IndexStats {
            passages: usize::try_from(passages).unwrap_or(0),
            sources: usize::try_from(sources).unwrap_or(0),
        })
    }

    fn search_blocking(
        conn: &Mutex<Connection>,
        query: &str,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        let Some(fts_query) = to_fts_query(query) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(k).unwrap_or(i64::MAX);

        let conn = conn.lock().map_err(|_| RetrievalError::Poisoned)?;
        let mut stmt = conn.prepare_cached(SEARCH_SQL)?;
        let rows = stmt.query_map(params![fts_query, limit], |row| {
            let rank: f64 = row.get(7)?;
            Ok(Passage {
                content: row.get(0)?,
                source: row.get(1)?,
                page: row.get(2)?,
                chapter: row.get(3)?,
                section: row.get(4)?,
                chunk_index: row.get(5)?,
                total_chunks: row.get(6)?,
                relevance_score: Some(-rank),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl std::fmt::Debug for SqliteRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRetriever")
            .field("conn", &"<rusqlite::Connection>")
            .finish()
    }
}

#[async_trait]
impl Retriever for SqliteRetriever {
    fn name(&self) -> &'static str {
        "sqlite-fts5"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let conn = Arc::clone(&self.conn);
        let query = query.to_string();
        let results = tokio::task::spawn_blocking(move || Self::search_blocking(&conn, &query, k))
            .await
            .map_err(|e| RetrievalError::Task {
                message: e.to_string(),
            })??;
        debug!(backend = "sqlite-fts5", k, hits = results.len(), "search complete");
        Ok(results)
    }
}

/// Turns free text into an FTS5 `OR` query of quoted terms.
///
/// Returns `None` when the text has no searchable terms, so punctuation-only
/// queries match nothing instead of failing to parse.
fn to_fts_query(text: &str) -> Option<String> {
    let word = Regex::new(r"\w+").ok()?;
    let terms: Vec<String> = word
        .find_iter(text)
        .map(|m| format!("\"{}\"", m.as_str().to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
