//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Default index location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".hoprag/index.db";

/// hoprag: multi-hop retrieval for maintenance questions.
///
/// Answers technician questions from an index of manual passages, citing
/// the pages each answer comes from.
#[derive(Parser, Debug)]
#[command(name = "hoprag")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the passage index.
    ///
    /// Defaults to `.hoprag/index.db` in the current directory.
    #[arg(short, long, env = "HOPRAG_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output (debug logging).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question from the indexed manuals.
    #[command(after_help = r#"Examples:
  hoprag ask "What is the oil change interval?"
  hoprag ask "Error E42 on the press" --no-agent          # single pass with expansion
  hoprag ask "Torque for the head bolts?" --no-agent --no-expansion
  hoprag ask "And the lower ones?" --history turns.json --stream
  hoprag --format json ask "Coolant type?" | jq '.sources[].page'
"#)]
    Ask {
        /// The technician's question.
        question: String,

        /// Use the multi-hop agent loop.
        #[arg(long, action = ArgAction::SetTrue, overrides_with = "no_agent")]
        agent: bool,

        /// Use single-pass retrieval instead of the agent loop.
        #[arg(long, action = ArgAction::SetTrue, overrides_with = "agent")]
        no_agent: bool,

        /// Disable query expansion on the single-pass path.
        #[arg(long)]
        no_expansion: bool,

        /// Iteration cap for the agent loop.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Passages per retrieval call.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Model for every generator call.
        #[arg(short, long)]
        model: Option<String>,

        /// JSON file with prior turns: `[{"role":"user","content":"..."}]`.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,

        /// Directory containing prompt template files.
        #[arg(long, env = "HOPRAG_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,
    },

    /// Search the index without generating an answer.
    #[command(after_help = r#"Examples:
  hoprag search "hydraulic pressure"
  hoprag search "E42" -k 10 --preview-len 300
  hoprag --format json search "coolant" | jq '.results[].source'
"#)]
    Search {
        /// Search query text.
        query: String,

        /// Maximum number of results.
        #[arg(short = 'k', long, default_value = "4")]
        top_k: usize,

        /// Preview length in characters.
        #[arg(long, default_value = "150")]
        preview_len: usize,
    },

    /// Import pre-chunked passages from a JSON-lines file.
    ///
    /// Each line is one passage: `{"content", "source", "page"?, "chapter"?,
    /// "section"?, "chunk_index"?, "total_chunks"?}`. Use `-` for stdin.
    Import {
        /// JSON-lines file, or `-` for stdin.
        file: PathBuf,
    },

    /// Show passage and source counts.
    Stats,

    /// Write the default prompt templates for editing.
    InitPrompts {
        /// Target directory (default: `~/.config/hoprag/prompts`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Serve the HTTP API (`/chat`, `/chat/stream`, `/health`).
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Directory containing prompt template files.
        #[arg(long, env = "HOPRAG_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Returns the index path, falling back to [`DEFAULT_DB_PATH`].
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }
}

/// Resolves `--agent`/`--no-agent` into an override.
#[must_use]
pub const fn agent_flag(agent: bool, no_agent: bool) -> Option<bool> {
    match (agent, no_agent) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|e| panic!("parse: {e}"))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_flags() {
        let cli = parse(&[
            "hoprag", "ask", "Oil?", "--no-agent", "--no-expansion", "-k", "6", "--stream",
        ]);
        let Commands::Ask {
            question,
            agent,
            no_agent,
            no_expansion,
            top_k,
            stream,
            ..
        } = cli.command
        else {
            panic!("expected ask");
        };
        assert_eq!(question, "Oil?");
        assert_eq!(agent_flag(agent, no_agent), Some(false));
        assert!(no_expansion);
        assert_eq!(top_k, Some(6));
        assert!(stream);
    }

    #[test]
    fn test_last_agent_flag_wins() {
        let cli = parse(&["hoprag", "ask", "q", "--no-agent", "--agent"]);
        let Commands::Ask { agent, no_agent, .. } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(agent_flag(agent, no_agent), Some(true));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse(&["hoprag", "stats", "--format", "json", "--db-path", "x.db"]);
        assert_eq!(cli.format, "json");
        assert_eq!(cli.get_db_path(), PathBuf::from("x.db"));
    }

    #[test]
    fn test_default_db_path() {
        let cli = Cli {
            db_path: None,
            verbose: false,
            format: "text".to_string(),
            command: Commands::Stats,
        };
        assert_eq!(cli.get_db_path(), PathBuf::from(DEFAULT_DB_PATH));
    }
}
