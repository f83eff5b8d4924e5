//! Progress events and the sinks that carry them.
//!
//! A request emits `status* token* sources metadata done`. The sink is the
//! only channel between the pipeline and its consumer; when the consumer
//! goes away the sink reports [`AgentError::Cancelled`] and the pipeline
//! stops before starting more work.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::SourceRecord;
use crate::error::AgentError;

/// Pipeline stage reported by a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Request accepted.
    Analyzing,
    /// Planning queries (expansion or agent start).
    Expanding,
    /// One retrieval call.
    Searching,
    /// Evidence gathered.
    Processing,
    /// Answer generation started.
    Generating,
}

/// A status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Pipeline stage.
    pub step: Step,
    /// Human-readable message.
    pub message: String,
    /// Query being searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// 1-based running search index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Number of searches, when known up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl Status {
    /// Creates a status with only a step and message.
    #[must_use]
    pub fn new(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            query: None,
            index: None,
            total: None,
        }
    }

    /// Creates a search status for the `index`-th query.
    #[must_use]
    pub fn search(query: &str, index: usize, total: Option<usize>) -> Self {
        Self {
            step: Step::Searching,
            message: format!("Search {index}: {}", crate::core::shorten(query, 50)),
            query: Some(query.to_string()),
            index: Some(index),
            total,
        }
    }
}

/// How a request gathered its evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagMode {
    /// Multi-hop agent loop.
    Agentic,
    /// Expanded queries, one retrieval round.
    SinglePassWithExpansion,
    /// The question alone, one retrieval call.
    SinglePass,
}

impl RagMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agentic => "agentic",
            Self::SinglePassWithExpansion => "single_pass_with_expansion",
            Self::SinglePass => "single_pass",
        }
    }
}

impl std::fmt::Display for RagMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing summary attached to every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagMetadata {
    /// Retrieval mode used.
    pub mode: RagMode,
    /// Agent iterations, or 1 for single-pass modes.
    pub iterations: usize,
    /// Queries sent to the retriever, in order.
    pub queries_executed: Vec<String>,
}

/// One event of a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Status update.
    Status(Status),
    /// Answer fragment.
    Token(String),
    /// Evidence used for the answer.
    Sources(Vec<SourceRecord>),
    /// Processing summary.
    Metadata(RagMetadata),
    /// End of stream.
    Done,
}

#[derive(Serialize)]
struct TokenPayload<'a> {
    token: &'a str,
}

impl ProgressEvent {
    /// Event name on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Token(_) => "token",
            Self::Sources(_) => "sources",
            Self::Metadata(_) => "metadata",
            Self::Done => "done",
        }
    }

    /// JSON payload on the wire (`[DONE]` for [`ProgressEvent::Done`]).
    #[must_use]
    pub fn data(&self) -> String {
        let json = match self {
            Self::Status(status) => serde_json::to_string(status),
            Self::Token(text) => serde_json::to_string(&TokenPayload { token: text }),
            Self::Sources(sources) => serde_json::to_string(sources),
            Self::Metadata(meta) => serde_json::to_string(meta),
            Self::Done => return "[DONE]".to_string(),
        };
        json.unwrap_or_else(|_| "{}".to_string())
    }

    /// Renders the event as one server-sent-events frame.
    #[must_use]
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.kind(), self.data())
    }
}

/// Receiver of progress events for one request.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Delivers an event.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when the consumer is gone.
    async fn emit(&self, event: ProgressEvent) -> Result<(), AgentError>;

    /// Returns `true` once the consumer is gone.
    fn is_closed(&self) -> bool {
        false
    }

    /// Fails with [`AgentError::Cancelled`] if the consumer is gone.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] when [`ProgressSink::is_closed`].
    fn ensure_open(&self) -> Result<(), AgentError> {
        if self.is_closed() {
            Err(AgentError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ProgressSink for NoopSink {
    async fn emit(&self, _event: ProgressEvent) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Sink backed by a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelSink {
    /// Wraps a channel sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn emit(&self, event: ProgressEvent) -> Result<(), AgentError> {
        self.tx.send(event).await.map_err(|_| AgentError::Cancelled)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
