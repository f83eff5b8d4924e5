//! Scripted collaborators for unit tests.

#![allow(clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::progress::{ProgressEvent, ProgressSink};
use super::provider::{LlmProvider, TokenStream};
use super::tool::{SEARCH_TOOL, ToolCall};
use crate::core::Passage;
use crate::error::{AgentError, RetrievalError};
use crate::retrieval::Retriever;

/// One scripted generator reply.
pub enum Reply {
    Text(String),
    Search(Vec<String>),
    Calls(Vec<ToolCall>),
    Fail,
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

pub fn search(queries: &[&str]) -> Reply {
    Reply::Search(queries.iter().map(ToString::to_string).collect())
}

/// Provider that plays back replies in order, then answers `fallback`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    fallback: String,
    chunks: Option<Vec<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: "fallback answer".to_string(),
            chunks: None,
            delay: None,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Streams these chunks from `chat_stream`.
    pub fn with_stream(mut self, chunks: &[&str]) -> Self {
        self.chunks = Some(chunks.iter().map(ToString::to_string).collect());
        self
    }

    /// Sleeps this long inside every `chat` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `chat` calls that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self, request: &ChatRequest) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Reply::Text(self.fallback.clone()))
    }
}

fn response(content: String, tool_calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        content,
        usage: TokenUsage::default(),
        tool_calls,
        finish_reason: Some("stop".to_string()),
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports_streaming(&self) -> bool {
        self.chunks.is_some()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let reply = self.next_reply(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        match reply {
            Reply::Text(content) => Ok(response(content, Vec::new())),
            Reply::Search(queries) => {
                let calls = queries
                    .iter()
                    .enumerate()
                    .map(|(i, q)| ToolCall {
                        id: format!("call_{i}"),
                        name: SEARCH_TOOL.to_string(),
                        arguments: serde_json::json!({ "query": q }).to_string(),
                    })
                    .collect();
                Ok(response(String::new(), calls))
            }
            Reply::Calls(calls) => Ok(response(String::new(), calls)),
            Reply::Fail => Err(AgentError::ApiRequest {
                message: "scripted failure".to_string(),
                status: Some(500),
            }),
        }
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TokenStream, AgentError> {
        let Some(chunks) = self.chunks.clone() else {
            return Err(AgentError::StreamingUnsupported {
                provider: "scripted".to_string(),
            });
        };
        let _ = self.next_reply(request);
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

/// Retriever over a fixed query → passages table that logs every call.
#[derive(Default)]
pub struct MemoryRetriever {
    table: HashMap<String, Vec<Passage>>,
    fail_on: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, passages: Vec<Passage>) -> Self {
        self.table.insert(query.to_string(), passages);
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.fail_on = Some(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Retriever for MemoryRetriever {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.to_string());
        if self.fail_on.as_deref() == Some(query) {
            return Err(RetrievalError::Task {
                message: "index offline".to_string(),
            });
        }
        Ok(self
            .table
            .get(query)
            .map(|p| p.iter().take(k).cloned().collect())
            .unwrap_or_default())
    }
}

/// Sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(ProgressEvent::kind).collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn emit(&self, event: ProgressEvent) -> Result<(), AgentError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Passage on `page` of `manual.pdf`.
pub fn page(n: u32, content: &str) -> Passage {
    Passage::new(content, "manual.pdf").with_page(n).with_chunk(n, 200)
}
