//! # hoprag
//!
//! Multi-hop retrieval orchestrator for grounded maintenance question
//! answering.
//!
//! A question is answered from an index of manual passages in one of three
//! modes: an agent loop that searches until it has enough evidence, a single
//! pass over generated query variants, or a single pass over the question
//! alone. Answers cite their sources, and every step can be streamed as
//! progress events.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hoprag::agent::{Orchestrator, QueryOverrides, RagConfig, create_provider};
//! use hoprag::retrieval::SqliteRetriever;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RagConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let index = Arc::new(SqliteRetriever::open(std::path::Path::new("index.db"))?);
//! let rag = Orchestrator::new(provider, index, config);
//!
//! let response = rag
//!     .query("What is the oil change interval?", &QueryOverrides::default())
//!     .await?;
//! assert!(!response.answer.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod retrieval;
#[cfg(feature = "server")]
pub mod server;

pub use error::{AgentError, CommandError, Error, Result, RetrievalError};
