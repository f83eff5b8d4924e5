//! Single-pass retrieval over several queries.
//!
//! Queries run one after another. Results are merged in first-seen order,
//! deduplicated with [`EvidenceKey`](crate::core::EvidenceKey) identity,
//! and cut to `2 * k` passages.

use tracing::debug;

use super::progress::{ProgressEvent, ProgressSink, Status};
use crate::core::{EvidenceStore, Passage};
use crate::error::AgentError;
use crate::retrieval::Retriever;

/// Merges retrieval results for a list of queries.
pub struct RetrievalAggregator<'a> {
    retriever: &'a dyn Retriever,
    k: usize,
}

impl std::fmt::Debug for RetrievalAggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalAggregator")
            .field("retriever", &self.retriever.name())
            .field("k", &self.k)
            .finish()
    }
}

impl<'a> RetrievalAggregator<'a> {
    /// Creates an aggregator fetching `k` passages per query.
    #[must_use]
    pub fn new(retriever: &'a dyn Retriever, k: usize) -> Self {
        Self { retriever, k }
    }

    /// Maximum merged passages returned.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.k.saturating_mul(2)
    }

    /// Runs every query and merges the results.
    ///
    /// Emits one search status per query with its 1-based index and the
    /// total query count.
    ///
    /// # Errors
    ///
    /// Propagates the first retrieval failure; returns
    /// [`AgentError::Cancelled`] once the progress consumer is gone.
    pub async fn gather(
        &self,
        queries: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Passage>, AgentError> {
        let total = queries.len();
        let mut store = EvidenceStore::new();
        for (i, query) in queries.iter().enumerate() {
            sink.ensure_open()?;
            sink.emit(ProgressEvent::Status(Status::search(query, i + 1, Some(total))))
                .await?;
            let results = self.retriever.search(query, self.k).await?;
            let hits = results.len();
            let kept = store.extend(results);
            debug!(query = %query, hits, kept, "aggregated search");
        }
        let mut merged = store.into_passages();
        merged.truncate(self.limit());
        Ok(merged)
    }
}
