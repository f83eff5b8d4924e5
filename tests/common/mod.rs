//! Shared mocks for integration tests.

#![allow(dead_code, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use hoprag::agent::tool::SEARCH_TOOL;
use hoprag::agent::{
    ChatRequest, ChatResponse, LlmProvider, Orchestrator, PromptSet, RagConfig, TokenStream,
    TokenUsage, ToolCall,
};
use hoprag::core::Passage;
use hoprag::error::{AgentError, RetrievalError};
use hoprag::retrieval::Retriever;

/// What the mock generator does on an agent turn.
#[derive(Debug, Clone)]
pub enum Turn {
    /// Request these searches.
    Search(Vec<String>),
    /// Answer with text.
    Answer(String),
}

pub fn search(q: &str) -> Turn {
    Turn::Search(vec![q.to_string()])
}

pub fn answer(text: &str) -> Turn {
    Turn::Answer(text.to_string())
}

/// Generator mock.
///
/// Requests offering tools are agent turns and play back `turns` in order;
/// once the script is exhausted, `endless` keeps requesting fresh searches
/// and otherwise the mock answers. Requests without tools (expansion and
/// answer composition) get `plain` replies in order, then `"final answer"`.
pub struct MockProvider {
    turns: Mutex<VecDeque<Turn>>,
    plain: Mutex<VecDeque<String>>,
    endless: bool,
    stream_chunks: Option<Vec<String>>,
    agent_calls: AtomicUsize,
    plain_calls: AtomicUsize,
    stream_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            plain: Mutex::new(VecDeque::new()),
            endless: false,
            stream_chunks: None,
            agent_calls: AtomicUsize::new(0),
            plain_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }

    /// Always requests a search it has not requested before.
    pub fn endless() -> Self {
        Self {
            endless: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_plain(self, replies: &[&str]) -> Self {
        *self.plain.lock().unwrap_or_else(PoisonError::into_inner) =
            replies.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_stream(mut self, chunks: &[&str]) -> Self {
        self.stream_chunks = Some(chunks.iter().map(ToString::to_string).collect());
        self
    }

    pub fn agent_calls(&self) -> usize {
        self.agent_calls.load(Ordering::SeqCst)
    }

    pub fn plain_calls(&self) -> usize {
        self.plain_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    fn next_turn(&self, n: usize) -> Turn {
        let scripted = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(turn) => turn,
            None if self.endless => search(&format!("fresh query {n}")),
            None => answer("final answer"),
        }
    }
}

fn reply(content: String, tool_calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        content,
        usage: TokenUsage::default(),
        tool_calls,
        finish_reason: Some("stop".to_string()),
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supports_streaming(&self) -> bool {
        self.stream_chunks.is_some()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        if request.tools.is_empty() {
            self.plain_calls.fetch_add(1, Ordering::SeqCst);
            let text = self
                .plain
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| "final answer".to_string());
            return Ok(reply(text, Vec::new()));
        }

        let n = self.agent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.next_turn(n) {
            Turn::Answer(text) => reply(text, Vec::new()),
            Turn::Search(queries) => reply(
                String::new(),
                queries
                    .iter()
                    .enumerate()
                    .map(|(i, q)| ToolCall {
                        id: format!("call_{n}_{i}"),
                        name: SEARCH_TOOL.to_string(),
                        arguments: serde_json::json!({ "query": q }).to_string(),
                    })
                    .collect(),
            ),
        })
    }

    async fn chat_stream(&self, _request: &ChatRequest) -> Result<TokenStream, AgentError> {
        let Some(chunks) = self.stream_chunks.clone() else {
            return Err(AgentError::StreamingUnsupported {
                provider: "mock".to_string(),
            });
        };
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

/// Retriever mock that records every `(query, k)` call.
#[derive(Default)]
pub struct MockRetriever {
    table: HashMap<String, Vec<Passage>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl MockRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, passages: Vec<Passage>) -> Self {
        self.table.insert(query.to_string(), passages);
        self
    }

    /// Sleeps this long inside every search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls().into_iter().map(|(q, _)| q).collect()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.to_string(), k));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .table
            .get(query)
            .map(|p| p.iter().take(k).cloned().collect())
            .unwrap_or_default())
    }
}

/// Passage of `m.pdf` on `page`, chunk `chunk`.
pub fn passage(page: u32, chunk: u32, content: &str) -> Passage {
    Passage::new(content, "m.pdf").with_page(page).with_chunk(chunk, 50)
}

pub fn config() -> RagConfig {
    RagConfig::builder()
        .api_key("test-key")
        .build()
        .unwrap_or_else(|e| panic!("config: {e}"))
}

pub fn orchestrator(
    provider: &Arc<MockProvider>,
    retriever: &Arc<MockRetriever>,
    config: RagConfig,
) -> Orchestrator {
    Orchestrator::new(provider.clone(), retriever.clone(), config)
        .with_prompts(PromptSet::defaults())
}
