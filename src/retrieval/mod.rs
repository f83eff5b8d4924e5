//! Retriever capability and the bundled passage index.
//!
//! The orchestrator only depends on [`Retriever`]; how passages were chunked
//! and indexed is outside its concern. [`SqliteRetriever`] is the default
//! backend: an FTS5 index over pre-chunked passages.

pub mod sqlite;

use async_trait::async_trait;

use crate::core::Passage;
use crate::error::RetrievalError;

pub use sqlite::{IndexStats, SqliteRetriever};

/// Query → ranked passages.
///
/// Implementations must return an empty list, not an error, when nothing
/// matches. Calls are read-only and independent of each other.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Returns at most `k` passages for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] when the backend fails.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;
}
