//! CLI layer for hoprag.
//!
//! Provides the command-line interface using clap: asking questions,
//! searching and importing the passage index, scaffolding prompts and
//! serving the HTTP API.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
