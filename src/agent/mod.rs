//! Retrieval orchestration for maintenance questions.
//!
//! Answers a technician's question from a passage index with an
//! OpenAI-compatible generator. Three retrieval modes are available:
//!
//! ```text
//! question → Orchestrator
//!   ├── agentic: ResearchLoop (reason → search → record)* → evidence
//!   ├── single pass + expansion: ExpanderAgent → RetrievalAggregator
//!   ├── single pass: one Retriever call
//!   └── AnswerComposer → answer (+ token events when streaming)
//! ```
//!
//! The agent loop is driven by the pure transition function in [`state`];
//! progress reaches callers through a [`ProgressSink`].

pub mod agentic_loop;
pub mod aggregator;
pub mod client;
pub mod composer;
pub mod config;
pub mod expander;
pub mod message;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod state;
pub mod tool;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use agentic_loop::{ResearchAgent, ResearchLoop, ResearchOutcome};
pub use aggregator::RetrievalAggregator;
pub use client::create_provider;
pub use composer::AnswerComposer;
pub use config::{ModelOption, RagConfig};
pub use expander::ExpanderAgent;
pub use message::{ChatMessage, ChatRequest, ChatResponse, HistoryTurn, Role, TokenUsage};
pub use orchestrator::{Orchestrator, QueryOverrides, RagResponse, validate_question};
pub use progress::{
    ChannelSink, NoopSink, ProgressEvent, ProgressSink, RagMetadata, RagMode, Status, Step,
};
pub use prompt::{PromptRole, PromptSet};
pub use provider::{LlmProvider, TokenStream};
pub use state::{AgentState, StopReason};
pub use tool::{AgentAction, ToolCall, ToolDefinition};
pub use traits::{Agent, AgentResponse};
