//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use blueprint_core::{Services, generate_blueprint};
use blueprint_orchestrator::{ExecutionState, StepObserver, StepRecord};
use blueprint_retrieval::{
    Chunker, Cl100kTokenizer, DocumentExtractor, OpenAiEmbedder, RetrievalPipeline,
    RetrievedContext, content_type_for_path,
};
use blueprint_shared::{
    AppConfig, BlueprintError, SourceDocument, init_config, load_config, load_config_from,
    validate_api_keys,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Blueprint: turn a business document into a GenAI statement of work.
#[derive(Parser)]
#[command(
    name = "blueprint",
    version,
    about = "Generate a multi-section GenAI statement of work grounded in a source document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.blueprint/blueprint.toml).
    #[arg(long, global = true, env = "BLUEPRINT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate the full document from a source file.
    Generate {
        /// Source document (.pdf, .md or .txt).
        file: PathBuf,

        /// Declared content type (inferred from the extension when omitted).
        #[arg(long)]
        content_type: Option<String>,

        /// Write the markdown here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write the execution log as JSON.
        #[arg(long)]
        log_out: Option<PathBuf>,
    },

    /// Ingest a file and print ingestion statistics.
    Ingest {
        file: PathBuf,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Ingest a file, then print the context retrieved for a query.
    Query {
        file: PathBuf,

        query: String,

        /// Chunks to retrieve (defaults to retrieval.top_k).
        #[arg(short)]
        k: Option<usize>,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "blueprint=info",
        1 => "blueprint=debug",
        _ => "blueprint=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Generate {
            file,
            content_type,
            out,
            log_out,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_generate(config, &file, content_type.as_deref(), out, log_out).await
        }
        Command::Ingest { file, content_type } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_ingest(config, &file, content_type.as_deref()).await
        }
        Command::Query {
            file,
            query,
            k,
            content_type,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_query(config, &file, &query, k, content_type.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Read `path` into a source document, taking the content type from the
/// flag or the file extension.
fn read_document(path: &Path, content_type: Option<&str>) -> Result<SourceDocument> {
    let content_type = resolve_content_type(path, content_type)?;
    let bytes = std::fs::read(path).map_err(|e| BlueprintError::io(path, e))?;
    Ok(SourceDocument::new(
        bytes,
        content_type,
        path.display().to_string(),
    ))
}

fn resolve_content_type(path: &Path, declared: Option<&str>) -> Result<String> {
    match declared {
        Some(ct) => Ok(ct.to_string()),
        None => content_type_for_path(path).map(String::from).ok_or_else(|| {
            eyre!(
                "cannot infer content type of '{}'; pass --content-type",
                path.display()
            )
        }),
    }
}

/// Retrieval pipeline for the ingest/query commands (no completion client
/// needed).
fn retrieval_pipeline(config: &AppConfig) -> blueprint_shared::Result<RetrievalPipeline> {
    let chunker = Chunker::new(
        Arc::new(Cl100kTokenizer::new()?),
        config.chunking.chunk_size,
        config.chunking.overlap,
    )?;
    RetrievalPipeline::new(
        Arc::new(DocumentExtractor::new()),
        chunker,
        Arc::new(OpenAiEmbedder::from_config(&config.embedding)?),
    )
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(
    config: AppConfig,
    file: &Path,
    content_type: Option<&str>,
    out: Option<PathBuf>,
    log_out: Option<PathBuf>,
) -> Result<()> {
    validate_api_keys(&config)?;
    let document = read_document(file, content_type)?;

    info!(
        file = %file.display(),
        content_type = %document.content_type,
        "generating blueprint"
    );

    // Blocking HTTP clients and retry sleeps stay off the async runtime.
    let result = tokio::task::spawn_blocking(move || {
        let progress = CliProgress::new();
        let services = Services::from_config(config)?;
        let result = generate_blueprint(&services, &document, &progress);
        progress.finish();
        result
    })
    .await
    .wrap_err("generation worker panicked")??;

    if let Some(path) = &log_out {
        let json = serde_json::to_string_pretty(&result.execution_log)?;
        std::fs::write(path, json).map_err(|e| BlueprintError::io(path, e))?;
    }

    match &out {
        Some(path) => {
            std::fs::write(path, &result.markdown).map_err(|e| BlueprintError::io(path, e))?;

            println!();
            println!("  Blueprint generated!");
            println!("  Document: {}", result.ingest.document_id);
            println!("  Chunks:   {}", result.ingest.chunks_stored);
            println!("  Steps:    {}", result.execution_log.len());
            println!("  Output:   {}", path.display());
            if let Some(log_path) = &log_out {
                println!("  Log:      {}", log_path.display());
            }
            println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
            println!();
        }
        None => println!("{}", result.markdown),
    }

    Ok(())
}

async fn cmd_ingest(config: AppConfig, file: &Path, content_type: Option<&str>) -> Result<()> {
    let document = read_document(file, content_type)?;

    let stats = tokio::task::spawn_blocking(move || {
        let pipeline = retrieval_pipeline(&config)?;
        pipeline.ingest(&document)
    })
    .await
    .wrap_err("ingestion worker panicked")??;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn cmd_query(
    config: AppConfig,
    file: &Path,
    query: &str,
    k: Option<usize>,
    content_type: Option<&str>,
) -> Result<()> {
    let document = read_document(file, content_type)?;
    let k = k.unwrap_or(config.retrieval.top_k);
    let query = query.to_string();

    let context = tokio::task::spawn_blocking(move || {
        let pipeline = retrieval_pipeline(&config)?;
        pipeline.ingest(&document)?;
        pipeline.retrieve(&query, k)
    })
    .await
    .wrap_err("query worker panicked")??;

    match context {
        RetrievedContext::Found { context, hits } => {
            info!(
                hits = hits.len(),
                best_score = hits.first().map(|h| h.score),
                "retrieved"
            );
            println!("{context}");
        }
        RetrievedContext::NotFound => println!("No relevant context found."),
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Step progress on a single indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner.set_message("Ingesting document");
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl StepObserver for CliProgress {
    fn step_started(&self, index: usize, total: usize, name: &str) {
        self.spinner
            .set_message(format!("[{}/{total}] {name}", index + 1));
    }

    fn step_retrying(&self, name: &str, attempt: u32, error: &BlueprintError) {
        self.spinner
            .set_message(format!("{name}: attempt {attempt} failed ({error}), retrying"));
    }

    fn step_finished(&self, record: &StepRecord) {
        let mark = match (record.state, record.recovered) {
            (ExecutionState::Success, _) => "done",
            (_, true) => "failed, placeholder used",
            _ => "failed",
        };
        self.spinner
            .println(format!("  {} ({mark})", record.step_name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_flags() {
        let cli = Cli::parse_from([
            "blueprint",
            "-v",
            "generate",
            "brief.pdf",
            "--out",
            "sow.md",
            "--log-out",
            "log.json",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Generate {
                file, out, log_out, ..
            } => {
                assert_eq!(file, PathBuf::from("brief.pdf"));
                assert_eq!(out, Some(PathBuf::from("sow.md")));
                assert_eq!(log_out, Some(PathBuf::from("log.json")));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn content_type_inference() {
        assert_eq!(
            resolve_content_type(Path::new("notes.md"), None).unwrap(),
            "text/markdown"
        );
        assert_eq!(
            resolve_content_type(Path::new("scan.png"), Some("application/pdf")).unwrap(),
            "application/pdf"
        );
        assert!(resolve_content_type(Path::new("scan.png"), None).is_err());
    }
}
