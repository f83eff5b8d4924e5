//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands return their
//! output as a string; `ask --stream` additionally writes tokens to stdout
//! as they arrive.

use std::fs::File;
use std::io::{self, BufReader, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{
    HistoryTurn, LlmProvider, Orchestrator, ProgressEvent, ProgressSink, QueryOverrides,
    RagConfig, create_provider,
};
use crate::cli::output::{
    OutputFormat, format_answer, format_search_results, format_sources_footer, format_stats,
};
use crate::cli::parser::{Cli, Commands, agent_flag};
use crate::error::{AgentError, CommandError, Result};
use crate::retrieval::{Retriever, SqliteRetriever};

/// Parameters for the `ask` command.
#[derive(Debug, Clone, Default)]
pub struct AskParams<'a> {
    /// The technician's question.
    pub question: &'a str,
    /// Agent loop override.
    pub use_agent: Option<bool>,
    /// Disable query expansion.
    pub no_expansion: bool,
    /// Iteration cap override.
    pub max_iterations: Option<usize>,
    /// Passages per retrieval call.
    pub top_k: Option<usize>,
    /// Model override.
    pub model: Option<&'a str>,
    /// JSON file with prior turns.
    pub history: Option<&'a Path>,
    /// Print tokens as they are generated.
    pub stream: bool,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Ask {
            question,
            agent,
            no_agent,
            no_expansion,
            max_iterations,
            top_k,
            model,
            history,
            stream,
            prompt_dir,
        } => {
            let params = AskParams {
                question,
                use_agent: agent_flag(*agent, *no_agent),
                no_expansion: *no_expansion,
                max_iterations: *max_iterations,
                top_k: *top_k,
                model: model.as_deref(),
                history: history.as_deref(),
                stream: *stream,
                prompt_dir: prompt_dir.as_deref(),
            };
            cmd_ask(&db_path, &params, format)
        }
        Commands::Search {
            query,
            top_k,
            preview_len,
        } => cmd_search(&db_path, query, *top_k, *preview_len, format),
        Commands::Import { file } => cmd_import(&db_path, file, format),
        Commands::Stats => cmd_stats(&db_path, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        #[cfg(feature = "server")]
        Commands::Serve {
            host,
            port,
            prompt_dir,
        } => cmd_serve(&db_path, host, *port, prompt_dir.as_deref()),
    }
}

/// Opens an existing index.
fn open_index(db_path: &Path) -> Result<SqliteRetriever> {
    if !db_path.exists() {
        return Err(CommandError::ExecutionFailed(format!(
            "No index at {}. Run `hoprag import <file>` first.",
            db_path.display()
        ))
        .into());
    }
    Ok(SqliteRetriever::open(db_path)?)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Builds the pipeline from the environment and an open index.
fn build_orchestrator(db_path: &Path, prompt_dir: Option<&Path>) -> Result<Orchestrator> {
    let mut builder = RagConfig::builder();
    if let Some(dir) = prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    let config = builder.from_env().build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Configuration error: {e}"))
    })?;

    let provider: Arc<dyn LlmProvider> = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let retriever: Arc<dyn Retriever> = Arc::new(open_index(db_path)?);

    Ok(Orchestrator::new(provider, retriever, config))
}

/// Reads prior turns from a JSON array file.
fn read_history(path: &Path) -> Result<Vec<HistoryTurn>> {
    let file = File::open(path).map_err(|e| {
        CommandError::InvalidInput(format!("Cannot read history file {}: {e}", path.display()))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        CommandError::InvalidInput(format!("Invalid history file {}: {e}", path.display())).into()
    })
}

fn cmd_ask(db_path: &Path, params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    let history = params.history.map(read_history).transpose()?.unwrap_or_default();
    let overrides = QueryOverrides {
        use_agent: params.use_agent,
        use_query_expansion: params.no_expansion.then_some(false),
        model: params.model.map(String::from),
        max_iterations: params.max_iterations,
        retrieval_k: params.top_k,
        history,
        conversation_id: None,
    };

    let orchestrator = build_orchestrator(db_path, params.prompt_dir)?;
    let rt = runtime()?;

    if params.stream {
        let sink = TerminalSink { format };
        let response = rt.block_on(orchestrator.run_streaming(params.question, &overrides, &sink))?;
        return Ok(match format {
            OutputFormat::Json => String::new(),
            OutputFormat::Text => format!("\n{}", format_sources_footer(&response)),
        });
    }

    let response = rt.block_on(orchestrator.query(params.question, &overrides))?;
    Ok(format_answer(&response, format))
}

/// Writes streamed events to the terminal.
///
/// Text output prints tokens to stdout and status messages to stderr; JSON
/// output prints every event as a server-sent-events frame. A closed stdout
/// cancels the request.
struct TerminalSink {
    format: OutputFormat,
}

#[async_trait]
impl ProgressSink for TerminalSink {
    async fn emit(&self, event: ProgressEvent) -> std::result::Result<(), AgentError> {
        let written = match (self.format, &event) {
            (OutputFormat::Json, _) => write_flush(&mut io::stdout(), &event.to_sse_frame()),
            (OutputFormat::Text, ProgressEvent::Token(token)) => {
                write_flush(&mut io::stdout(), token)
            }
            (OutputFormat::Text, ProgressEvent::Status(status)) => {
                write_flush(&mut io::stderr(), &format!("> {}\n", status.message))
            }
            (OutputFormat::Text, _) => Ok(()),
        };
        written.map_err(|_| AgentError::Cancelled)
    }
}

fn write_flush(out: &mut impl IoWrite, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn cmd_search(
    db_path: &Path,
    query: &str,
    top_k: usize,
    preview_len: usize,
    format: OutputFormat,
) -> Result<String> {
    let index = open_index(db_path)?;
    let rt = runtime()?;
    let results = rt.block_on(index.search(query, top_k))?;
    Ok(format_search_results(&results, query, preview_len, format))
}

fn cmd_import(db_path: &Path, file: &Path, format: OutputFormat) -> Result<String> {
    let index = SqliteRetriever::open(db_path)?;
    let imported = if file == Path::new("-") {
        index.import_jsonl(io::stdin().lock())?
    } else {
        let reader = File::open(file).map_err(|e| {
            CommandError::InvalidInput(format!("Cannot open {}: {e}", file.display()))
        })?;
        index.import_jsonl(BufReader::new(reader))?
    };
    let stats = index.stats()?;

    Ok(match format {
        OutputFormat::Text => format!(
            "Imported {imported} passages into {} ({} passages from {} sources)\n",
            db_path.display(),
            stats.passages,
            stats.sources
        ),
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "imported": imported,
            "db_path": db_path.display().to_string(),
            "passages": stats.passages,
            "sources": stats.sources,
        })),
    })
}

fn cmd_stats(db_path: &Path, format: OutputFormat) -> Result<String> {
    let index = open_index(db_path)?;
    Ok(format_stats(&index.stats()?, db_path, format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    use crate::agent::PromptSet;

    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    Ok(match format {
        OutputFormat::Text if written.is_empty() => format!(
            "All prompt templates already exist in: {}\n",
            target_dir.display()
        ),
        OutputFormat::Text => {
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");
                output.push_str(&format!("  {name}\n"));
            }
            output.push_str("\nEdit these files to customize the prompts.\n");
            output
        }
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "directory": target_dir.display().to_string(),
            "written": written
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
        })),
    })
}

#[cfg(feature = "server")]
fn cmd_serve(db_path: &Path, host: &str, port: u16, prompt_dir: Option<&Path>) -> Result<String> {
    let orchestrator = Arc::new(build_orchestrator(db_path, prompt_dir)?);
    let rt = runtime()?;
    rt.block_on(crate::server::serve(orchestrator, host, port))
        .map_err(|e| CommandError::ExecutionFailed(format!("Server error: {e}")))?;
    Ok(String::new())
}
