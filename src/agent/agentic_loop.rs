//! Multi-hop research loop.
//!
//! Drives the generator ↔ retriever round-trip: the research agent reads
//! the transcript and either requests searches or answers. Searches run
//! against the [`Retriever`], their summaries go back into the transcript,
//! and the loop repeats until the state machine in [`super::state`] says
//! stop.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::message::{ChatMessage, assistant_turn, tool_message};
use super::progress::{ProgressEvent, ProgressSink, Status};
use super::prompt::format_search_summary;
use super::provider::LlmProvider;
use super::state::{AgentState, Effect, Event, StopReason, start, transition};
use super::tool::{AgentAction, DecodedTurn, ToolCall, ToolDefinition};
use super::traits::Agent;
use crate::core::{PREVIEW_LEN, Passage};
use crate::error::AgentError;
use crate::retrieval::Retriever;

/// Agent that decides which searches to run and when to answer.
#[derive(Debug, Clone)]
pub struct ResearchAgent {
    model: String,
    system_prompt: String,
    temperature: f32,
}

impl ResearchAgent {
    /// Creates a research agent.
    #[must_use]
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature,
        }
    }
}

impl Agent for ResearchAgent {
    fn name(&self) -> &'static str {
        "research"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        AgentAction::definitions()
    }
}

/// Result of a research run.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    /// Final per-request state.
    pub state: AgentState,
    /// Why the loop stopped.
    pub stop: StopReason,
}

impl ResearchOutcome {
    /// Answer the agent wrote itself, if it finished by answering.
    ///
    /// Forced stops and blank answers return `None`; the caller then
    /// composes an answer from the gathered evidence.
    #[must_use]
    pub fn direct_answer(&self) -> Option<String> {
        if self.stop != StopReason::Answered {
            return None;
        }
        self.state
            .extract_answer()
            .ok()
            .filter(|a| !a.trim().is_empty())
    }
}

/// Collaborators and limits for one research run.
pub struct ResearchLoop<'a> {
    /// Generator.
    pub provider: &'a dyn LlmProvider,
    /// Passage index.
    pub retriever: &'a dyn Retriever,
    /// Research agent configuration.
    pub agent: &'a ResearchAgent,
    /// Passages per search.
    pub k: usize,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Progress consumer.
    pub sink: &'a dyn ProgressSink,
}

impl std::fmt::Debug for ResearchLoop<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchLoop")
            .field("provider", &self.provider.name())
            .field("retriever", &self.retriever.name())
            .field("k", &self.k)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl ResearchLoop<'_> {
    /// Runs the loop over an opening conversation (history plus question).
    ///
    /// # Errors
    ///
    /// Propagates generator and retrieval failures, and returns
    /// [`AgentError::Cancelled`] once the progress consumer is gone.
    pub async fn run(&self, conversation: Vec<ChatMessage>) -> Result<ResearchOutcome, AgentError> {
        let mut state = AgentState::new(conversation);
        let (mut phase, mut effect) = start();
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut search_index = 0usize;

        let stop = loop {
            let event = match effect {
                Effect::Reason => {
                    self.sink.ensure_open()?;
                    let response = self.agent.converse(self.provider, &state.transcript).await?;
                    let decoded = DecodedTurn::decode(&response.tool_calls);
                    for (call, reason) in &decoded.rejected {
                        warn!(tool = %call.name, call_id = %call.id, %reason, "rejected action request");
                    }
                    state
                        .transcript
                        .push(assistant_turn(&response.content, response.tool_calls.clone()));
                    pending = response.tool_calls;
                    Event::Turn {
                        requested: decoded.is_request(),
                        queries: decoded.queries(),
                    }
                }
                Effect::Search(queries) => {
                    let summaries = self
                        .execute(&queries, &mut state, &mut search_index)
                        .await?;
                    for call in pending.drain(..) {
                        let content = match AgentAction::from_call(&call) {
                            Ok(action) => summaries
                                .get(action.query())
                                .cloned()
                                .unwrap_or_else(|| format_search_summary(&[])),
                            Err(e) => format!("Error: {e}"),
                        };
                        state.transcript.push(tool_message(&call.id, &content));
                    }
                    Event::Searched { queries }
                }
                Effect::Record(queries) => {
                    state.record(&queries);
                    debug!(
                        iteration = state.iteration_count,
                        executed = state.executed_queries.len(),
                        evidence = state.evidence.len(),
                        "iteration recorded"
                    );
                    Event::Recorded
                }
                Effect::Finish(reason) => break reason,
            };

            let (next, next_effect) =
                transition(phase, &state.facts(self.max_iterations), event)?;
            debug!(from = ?phase, to = ?next, "research transition");
            phase = next;
            effect = next_effect;
        };

        match stop {
            StopReason::Answered => {
                debug!(iterations = state.iteration_count, "research finished");
            }
            StopReason::IterationCap => info!(
                max_iterations = self.max_iterations,
                "iteration cap reached, forcing stop"
            ),
            StopReason::LoopDetected => info!(
                executed = ?state.executed_queries.as_slice(),
                "repeated search requested, forcing stop"
            ),
        }

        Ok(ResearchOutcome { state, stop })
    }

    /// Runs each query once, in order, returning its summary by query.
    async fn execute(
        &self,
        queries: &[String],
        state: &mut AgentState,
        search_index: &mut usize,
    ) -> Result<HashMap<String, String>, AgentError> {
        let mut summaries = HashMap::with_capacity(queries.len());
        for query in queries {
            self.sink.ensure_open()?;
            *search_index += 1;
            self.sink
                .emit(ProgressEvent::Status(Status::search(query, *search_index, None)))
                .await?;

            let results = self.retriever.search(query, self.k).await?;
            let previews: Vec<Passage> = results
                .iter()
                .map(|p| Passage {
                    relevance_score: None,
                    ..p.preview(PREVIEW_LEN)
                })
                .collect();
            summaries.insert(query.clone(), format_search_summary(&previews));
            let kept = state.evidence.extend(previews);
            debug!(query = %query, hits = results.len(), kept, "search executed");
        }
        Ok(summaries)
    }
}
