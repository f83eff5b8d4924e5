//! Research loop state machine.
//!
//! The loop is a pure transition function over four phases. The driver in
//! [`super::agentic_loop`] performs the returned [`Effect`], turns the
//! outcome into an [`Event`], and feeds it back. All stop conditions live
//! here, so they can be tested without a generator or a retriever.
//!
//! ```text
//! Reasoning --turn with request--> Acting --searched--> Updating --recorded--> Reasoning
//!     |
//!     +-- no request / iteration cap / repeated query --> Done
//! ```

use crate::core::{EvidenceStore, ExecutedQueries};
use crate::error::AgentError;

use super::message::{ChatMessage, Role};

/// Phase of the research loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the generator's next turn.
    Reasoning,
    /// Executing the searches the turn requested.
    Acting,
    /// Recording executed queries and counting the iteration.
    Updating,
    /// Terminal.
    Done,
}

impl Phase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Acting => "acting",
            Self::Updating => "updating",
            Self::Done => "done",
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The generator produced a turn without a search request.
    Answered,
    /// `iteration_count` reached `max_iterations`.
    IterationCap,
    /// The turn repeated an already executed query.
    LoopDetected,
}

impl StopReason {
    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::IterationCap => "iteration_cap",
            Self::LoopDetected => "loop_detected",
        }
    }
}

/// Counters the transition function reads.
#[derive(Debug, Clone, Copy)]
pub struct Facts<'a> {
    /// Completed iterations.
    pub iteration_count: usize,
    /// Cap on iterations.
    pub max_iterations: usize,
    /// Queries already issued in this request.
    pub executed: &'a ExecutedQueries,
}

/// Outcome of the previous effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The generator returned a turn.
    Turn {
        /// Whether the turn carried any action request, valid or not.
        requested: bool,
        /// Search queries decoded from the turn, in call order.
        queries: Vec<String>,
    },
    /// The requested searches were executed.
    Searched {
        /// Distinct queries that ran.
        queries: Vec<String>,
    },
    /// Executed queries were recorded and the iteration counted.
    Recorded,
}

impl Event {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Turn { .. } => "turn",
            Self::Searched { .. } => "searched",
            Self::Recorded => "recorded",
        }
    }
}

/// Work the driver must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the generator for its next turn.
    Reason,
    /// Run these queries, each once, in order.
    Search(Vec<String>),
    /// Append these queries to the ledger and count one iteration.
    Record(Vec<String>),
    /// Stop the loop.
    Finish(StopReason),
}

/// Initial phase and effect of a fresh request.
#[must_use]
pub const fn start() -> (Phase, Effect) {
    (Phase::Reasoning, Effect::Reason)
}

/// Computes the next phase and effect.
///
/// # Errors
///
/// Returns [`AgentError::InvalidTransition`] when `event` is not accepted in
/// `phase`.
pub fn transition(
    phase: Phase,
    facts: &Facts<'_>,
    event: Event,
) -> Result<(Phase, Effect), AgentError> {
    match (phase, event) {
        (Phase::Reasoning, Event::Turn { requested, queries }) => {
            if !requested {
                return Ok((Phase::Done, Effect::Finish(StopReason::Answered)));
            }
            if facts.iteration_count >= facts.max_iterations {
                return Ok((Phase::Done, Effect::Finish(StopReason::IterationCap)));
            }
            if queries.iter().any(|q| facts.executed.contains(q)) {
                return Ok((Phase::Done, Effect::Finish(StopReason::LoopDetected)));
            }
            Ok((Phase::Acting, Effect::Search(distinct(queries))))
        }
        (Phase::Acting, Event::Searched { queries }) => {
            Ok((Phase::Updating, Effect::Record(queries)))
        }
        (Phase::Updating, Event::Recorded) => Ok((Phase::Reasoning, Effect::Reason)),
        (phase, event) => Err(AgentError::InvalidTransition {
            phase: phase.as_str().to_string(),
            event: event.as_str().to_string(),
        }),
    }
}

fn distinct(queries: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(queries.len());
    for q in queries {
        if !out.contains(&q) {
            out.push(q);
        }
    }
    out
}

/// Per-request state of the research loop.
#[derive(Debug, Clone)]
pub struct AgentState {
    /// History, the question, then every turn of this request.
    pub transcript: Vec<ChatMessage>,
    /// Index of the first transcript message produced by this request.
    request_start: usize,
    /// Queries issued so far.
    pub executed_queries: ExecutedQueries,
    /// Completed iterations.
    pub iteration_count: usize,
    /// Deduplicated passages gathered so far.
    pub evidence: EvidenceStore,
    /// Answer text, once extracted.
    pub final_answer: Option<String>,
}

impl AgentState {
    /// Creates the state for one request from its opening conversation.
    #[must_use]
    pub fn new(conversation: Vec<ChatMessage>) -> Self {
        let request_start = conversation.len();
        Self {
            transcript: conversation,
            request_start,
            executed_queries: ExecutedQueries::new(),
            iteration_count: 0,
            evidence: EvidenceStore::new(),
            final_answer: None,
        }
    }

    /// Facts for the transition function.
    #[must_use]
    pub const fn facts(&self, max_iterations: usize) -> Facts<'_> {
        Facts {
            iteration_count: self.iteration_count,
            max_iterations,
            executed: &self.executed_queries,
        }
    }

    /// Records executed queries and counts one iteration.
    pub fn record(&mut self, queries: &[String]) {
        for q in queries {
            self.executed_queries.record(q);
        }
        self.iteration_count += 1;
    }

    /// Extracts the answer from this request's turns.
    ///
    /// Prefers the most recent assistant turn without an action request,
    /// then the most recent assistant turn of any kind. Caller history is
    /// never considered.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] if the generator produced no
    /// assistant turn.
    pub fn extract_answer(&self) -> Result<String, AgentError> {
        let turns = &self.transcript[self.request_start.min(self.transcript.len())..];
        let assistant = || turns.iter().rev().filter(|m| m.role == Role::Assistant);
        assistant()
            .find(|m| !m.requests_tools())
            .or_else(|| assistant().next())
            .map(|m| m.content.clone())
            .ok_or_else(|| AgentError::Orchestration {
                message: "generator produced no assistant turn".to_string(),
            })
    }
}
