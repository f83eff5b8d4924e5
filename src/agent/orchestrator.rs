//! Request pipeline.
//!
//! Coordinates one question end to end: pick a retrieval mode, gather
//! evidence (agent loop, expanded single pass, or plain single pass),
//! compose the answer, and report sources and metadata. The streaming
//! variant runs the same steps and emits progress events as it goes.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::agentic_loop::{ResearchAgent, ResearchLoop};
use super::aggregator::RetrievalAggregator;
use super::composer::{AnswerComposer, source_records};
use super::config::RagConfig;
use super::expander::ExpanderAgent;
use super::message::{HistoryTurn, history_messages, user_message};
use super::progress::{
    ChannelSink, NoopSink, ProgressEvent, ProgressSink, RagMetadata, RagMode, Status, Step,
};
use super::prompt::{PromptRole, PromptSet};
use super::provider::LlmProvider;
use crate::core::{Passage, SourceRecord};
use crate::error::AgentError;
use crate::retrieval::Retriever;

/// Maximum question length in bytes.
const MAX_QUERY_LEN: usize = 10_000;

/// Events buffered between a streaming request and its consumer.
const STREAM_BUFFER: usize = 64;

/// Per-request overrides of [`RagConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOverrides {
    /// Use the agent loop (`Some(true)`) or single pass (`Some(false)`).
    #[serde(default)]
    pub use_agent: Option<bool>,
    /// Expand the question on the single-pass path.
    #[serde(default)]
    pub use_query_expansion: Option<bool>,
    /// Model for every generator call of this request.
    #[serde(default)]
    pub model: Option<String>,
    /// Iteration cap for the agent loop.
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Passages per retrieval call.
    #[serde(default)]
    pub retrieval_k: Option<usize>,
    /// Prior conversation turns.
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// Conversation to continue; a fresh one is started when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Non-streaming answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    /// Answer text.
    pub answer: String,
    /// Evidence the answer was grounded on.
    pub sources: Vec<SourceRecord>,
    /// Processing summary.
    pub metadata: RagMetadata,
    /// Model that produced the answer.
    pub model_used: String,
    /// Conversation the answer belongs to.
    pub conversation_id: String,
}

/// Settings resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plan {
    mode: RagMode,
    conversation_id: String,
    model: String,
    k: usize,
    max_iterations: usize,
}

/// Evidence gathered by one of the retrieval modes.
#[derive(Debug)]
struct Gathered {
    passages: Vec<Passage>,
    queries: Vec<String>,
    iterations: usize,
    direct_answer: Option<String>,
}

/// Answers questions from a [`Retriever`] with an [`LlmProvider`].
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
    config: RagConfig,
    prompts: PromptSet,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("retriever", &self.retriever.name())
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// Loads prompt templates from [`RagConfig::prompt_dir`], falling back to
    /// compiled-in defaults.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        retriever: Arc<dyn Retriever>,
        config: RagConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            retriever,
            config,
            prompts,
        }
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &RagConfig {
        &self.config
    }

    fn plan(&self, overrides: &QueryOverrides) -> Plan {
        let use_agent = overrides.use_agent.unwrap_or(self.config.use_agent);
        let expand = overrides
            .use_query_expansion
            .unwrap_or(self.config.use_query_expansion);
        let mode = match (use_agent, expand) {
            (true, _) => RagMode::Agentic,
            (false, true) => RagMode::SinglePassWithExpansion,
            (false, false) => RagMode::SinglePass,
        };
        let conversation_id = overrides
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
        Plan {
            mode,
            conversation_id,
            model: overrides
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            k: overrides.retrieval_k.unwrap_or(self.config.retrieval_k).max(1),
            max_iterations: overrides
                .max_iterations
                .unwrap_or(self.config.max_iterations),
        }
    }

    /// Answers a question.
    ///
    /// In agentic mode the agent's own final turn is the answer when it
    /// finished by answering; after a forced stop the answer is composed
    /// from the gathered evidence.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidQuery`] for an empty or oversized
    /// question, and propagates retrieval and generation failures.
    pub async fn query(
        &self,
        question: &str,
        overrides: &QueryOverrides,
    ) -> Result<RagResponse, AgentError> {
        validate_question(question)?;
        let start = Instant::now();
        let plan = self.plan(overrides);
        let gathered = self
            .gather(question, &plan, &overrides.history, &NoopSink)
            .await?;

        let answer = match gathered.direct_answer {
            Some(answer) => answer,
            None => {
                self.composer(&plan)
                    .compose(question, &overrides.history, &gathered.passages)
                    .await?
            }
        };

        info!(
            conversation_id = %plan.conversation_id,
            mode = %plan.mode,
            iterations = gathered.iterations,
            sources = gathered.passages.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "query answered"
        );

        Ok(RagResponse {
            answer,
            sources: source_records(&gathered.passages),
            metadata: RagMetadata {
                mode: plan.mode,
                iterations: gathered.iterations,
                queries_executed: gathered.queries,
            },
            model_used: plan.model,
            conversation_id: plan.conversation_id,
        })
    }

    /// Answers a question, emitting `status* token* sources metadata done`.
    ///
    /// In agentic mode the agent only gathers evidence; the answer is always
    /// streamed by the composer.
    ///
    /// # Errors
    ///
    /// As [`Orchestrator::query`], plus [`AgentError::Cancelled`] once the
    /// sink reports its consumer gone. No further events are emitted after
    /// an error.
    pub async fn run_streaming(
        &self,
        question: &str,
        overrides: &QueryOverrides,
        sink: &dyn ProgressSink,
    ) -> Result<RagResponse, AgentError> {
        validate_question(question)?;
        let plan = self.plan(overrides);

        emit_status(sink, Step::Analyzing, "Analyzing your question...").await?;
        let gathered = self
            .gather(question, &plan, &overrides.history, sink)
            .await?;

        emit_status(sink, Step::Generating, "Generating response...").await?;
        let answer = self
            .composer(&plan)
            .compose_streaming(question, &overrides.history, &gathered.passages, sink)
            .await?;

        let sources = source_records(&gathered.passages);
        let metadata = RagMetadata {
            mode: plan.mode,
            iterations: gathered.iterations,
            queries_executed: gathered.queries,
        };
        sink.emit(ProgressEvent::Sources(sources.clone())).await?;
        sink.emit(ProgressEvent::Metadata(metadata.clone())).await?;
        sink.emit(ProgressEvent::Done).await?;

        Ok(RagResponse {
            answer,
            sources,
            metadata,
            model_used: plan.model,
            conversation_id: plan.conversation_id,
        })
    }

    /// Starts a streaming request on the runtime and returns its events.
    ///
    /// Dropping the receiver cancels the request. The retrieval or
    /// generation call in flight at that moment is dropped, and nothing
    /// further is started. A failed request ends the stream early without
    /// `sources`, `metadata` or `done`.
    pub fn query_stream(
        self: &Arc<Self>,
        question: String,
        overrides: QueryOverrides,
    ) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let disconnected = tx.clone();
            let sink = ChannelSink::new(tx);
            tokio::select! {
                result = this.run_streaming(&question, &overrides, &sink) => match result {
                    Ok(_) => {}
                    Err(AgentError::Cancelled) => debug!("stream consumer disconnected"),
                    Err(e) => warn!(error = %e, "streaming request failed"),
                },
                () = disconnected.closed() => {
                    debug!("stream consumer disconnected, pending work dropped");
                }
            }
        });
        rx
    }

    fn composer<'a>(&'a self, plan: &'a Plan) -> AnswerComposer<'a> {
        AnswerComposer::new(
            self.provider.as_ref(),
            &self.prompts,
            &plan.model,
            self.config.temperature,
            self.config.max_tokens,
        )
    }

    async fn gather(
        &self,
        question: &str,
        plan: &Plan,
        history: &[HistoryTurn],
        sink: &dyn ProgressSink,
    ) -> Result<Gathered, AgentError> {
        match plan.mode {
            RagMode::Agentic => self.gather_agentic(question, plan, history, sink).await,
            RagMode::SinglePassWithExpansion => self.gather_expanded(question, plan, sink).await,
            RagMode::SinglePass => self.gather_single(question, plan, sink).await,
        }
    }

    async fn gather_agentic(
        &self,
        question: &str,
        plan: &Plan,
        history: &[HistoryTurn],
        sink: &dyn ProgressSink,
    ) -> Result<Gathered, AgentError> {
        emit_status(sink, Step::Expanding, "Planning multi-hop retrieval...").await?;

        let agent = ResearchAgent::new(
            plan.model.clone(),
            self.prompts.get(PromptRole::Agent).to_string(),
            self.config.temperature,
        );
        let mut conversation = history_messages(history);
        conversation.push(user_message(question));

        let outcome = ResearchLoop {
            provider: self.provider.as_ref(),
            retriever: self.retriever.as_ref(),
            agent: &agent,
            k: plan.k,
            max_iterations: plan.max_iterations,
            sink,
        }
        .run(conversation)
        .await?;

        let direct_answer = outcome.direct_answer();
        let state = outcome.state;
        let passages = state.evidence.into_passages();
        let queries = state.executed_queries.into_vec();
        emit_status(
            sink,
            Step::Processing,
            &format!(
                "Retrieved {} documents across {} searches",
                passages.len(),
                queries.len()
            ),
        )
        .await?;

        Ok(Gathered {
            passages,
            queries,
            iterations: state.iteration_count,
            direct_answer,
        })
    }

    async fn gather_expanded(
        &self,
        question: &str,
        plan: &Plan,
        sink: &dyn ProgressSink,
    ) -> Result<Gathered, AgentError> {
        emit_status(sink, Step::Expanding, "Expanding search queries...").await?;
        sink.ensure_open()?;

        let expander = ExpanderAgent::new(
            plan.model.clone(),
            self.prompts.get(PromptRole::Expansion).to_string(),
            self.config.temperature,
        );
        let queries = expander.expand(self.provider.as_ref(), question).await;
        let passages = RetrievalAggregator::new(self.retriever.as_ref(), plan.k)
            .gather(&queries, sink)
            .await?;

        emit_status(
            sink,
            Step::Processing,
            &format!("Found {} relevant documents", passages.len()),
        )
        .await?;

        Ok(Gathered {
            passages,
            queries,
            iterations: 1,
            direct_answer: None,
        })
    }

    async fn gather_single(
        &self,
        question: &str,
        plan: &Plan,
        sink: &dyn ProgressSink,
    ) -> Result<Gathered, AgentError> {
        emit_status(sink, Step::Searching, "Searching documentation...").await?;
        sink.ensure_open()?;

        let passages = self.retriever.search(question, plan.k).await?;
        debug!(hits = passages.len(), "single-pass search");

        Ok(Gathered {
            passages,
            queries: vec![question.to_string()],
            iterations: 1,
            direct_answer: None,
        })
    }
}

async fn emit_status(sink: &dyn ProgressSink, step: Step, message: &str) -> Result<(), AgentError> {
    sink.emit(ProgressEvent::Status(Status::new(step, message)))
        .await
}

/// Rejects empty or oversized questions.
///
/// # Errors
///
/// Returns [`AgentError::InvalidQuery`] describing the problem.
pub fn validate_question(question: &str) -> Result<(), AgentError> {
    if question.trim().is_empty() {
        return Err(AgentError::InvalidQuery {
            message: "question cannot be empty".to_string(),
        });
    }
    if question.len() > MAX_QUERY_LEN {
        return Err(AgentError::InvalidQuery {
            message: format!(
                "question exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                question.len()
            ),
        });
    }
    Ok(())
}
