use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};

use docqa_core::config::{Config, Settings};
use docqa_engine::ingest::REPORT_FILE;
use docqa_engine::{ErrorPayload, Ingestor, QueryEngine, QueryRequest, QueryResponse};
use docqa_index::VectorIndex;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about your own documents")]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Config overlay to apply (defaults to $RUST_ENV or "dev")
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk and embed every document into the index
    Ingest {
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long)]
        index: Option<PathBuf>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Answer one question
    Ask {
        question: String,
        #[arg(long)]
        k: Option<i64>,
        /// Print the response (or error) payload as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive question loop; type `exit` to quit
    Chat {
        #[arg(long)]
        k: Option<i64>,
    },
    /// Remove a source file (or a single document id) from the index
    Delete { source: String },
    /// Show what the persisted index contains
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let env_name = cli
        .env
        .clone()
        .or_else(|| std::env::var("RUST_ENV").ok())
        .unwrap_or_else(|| "dev".to_string());
    tracing::debug!("loading config from {} (env '{}')", cli.config_dir.display(), env_name);
    let config = Config::load_from(&cli.config_dir, &env_name)?;
    Ok(config.settings()?)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = load_settings(&cli)?;
    match cli.command {
        Command::Ingest { source, index, no_progress } => {
            if let Some(source) = source {
                settings.data.source_dir = source.to_string_lossy().to_string();
            }
            if let Some(index) = index {
                settings.data.index_dir = index.to_string_lossy().to_string();
            }
            ingest(&settings, !no_progress).await
        }
        Command::Ask { question, k, json } => ask(&settings, QueryRequest { question, k }, json).await,
        Command::Chat { k } => chat(&settings, k).await,
        Command::Delete { source } => delete(&settings, &source).await,
        Command::Status => status(&settings).await,
    }
}

async fn ingest(settings: &Settings, progress: bool) -> Result<ExitCode> {
    let source_dir = settings.data.source_dir();
    let index_dir = settings.data.index_dir();
    println!("📚 Ingesting {} into {}", source_dir.display(), index_dir.display());

    let ingestor = Ingestor::from_settings(settings).await?.with_progress(progress);
    let report = ingestor.ingest_dir(&source_dir).await?;
    let report_path = index_dir.join(REPORT_FILE);
    report
        .write_json(&report_path)
        .with_context(|| format!("writing {}", report_path.display()))?;
    tracing::info!("ingest report written to {}", report_path.display());

    println!("Files loaded:      {}", report.files_loaded);
    println!("Documents loaded:  {}", report.documents_loaded);
    println!("Files skipped:     {}", report.skipped.len());
    println!("Files failed:      {}", report.file_failures.len());
    println!("Chunks created:    {}", report.chunks_created);
    println!("Chunks embedded:   {}", report.chunks_embedded);
    println!("Chunks reused:     {}", report.chunks_reused);
    println!("Chunks removed:    {}", report.chunks_removed);
    println!("Chunks failed:     {}", report.chunk_failures.len());
    for f in &report.file_failures {
        println!("  ✗ {}: {}", f.path.display(), f.reason);
    }
    if report.has_failures() {
        println!("⚠️  Some inputs failed; re-run to retry them (details in {})", report_path.display());
        return Ok(ExitCode::FAILURE);
    }
    println!("✅ Index is up to date");
    Ok(ExitCode::SUCCESS)
}

async fn ask(settings: &Settings, request: QueryRequest, json: bool) -> Result<ExitCode> {
    let result = match QueryEngine::open(settings).await {
        Ok(engine) => engine.ask(&request).await,
        Err(e) => {
            tracing::warn!("query engine unavailable: {}", e);
            Err(ErrorPayload::from(&e))
        }
    };
    match (result, json) {
        (Ok(response), true) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::SUCCESS)
        }
        (Ok(response), false) => {
            print_response(&response);
            Ok(ExitCode::SUCCESS)
        }
        (Err(payload), true) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(ExitCode::from(2))
        }
        (Err(payload), false) => {
            eprintln!("Error ({}, {}): {}", payload.status, payload.category, payload.message);
            if payload.retryable() {
                eprintln!("The service is temporarily unavailable; please try again.");
            }
            Ok(ExitCode::from(2))
        }
    }
}

async fn chat(settings: &Settings, k: Option<i64>) -> Result<ExitCode> {
    let engine = QueryEngine::open(settings).await?;
    let info = engine.info();
    println!("💬 {} passages from {} files loaded. Type 'exit' to quit.", info.entries, info.sources);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nQuestion: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        match engine.ask(&QueryRequest { question: question.to_string(), k }).await {
            Ok(response) => print_response(&response),
            Err(payload) => eprintln!("Error ({}): {}", payload.category, payload.message),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_response(response: &QueryResponse) {
    println!("\nAnswer:\n{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for s in &response.sources {
            println!("- Source: {}, {}", s.source_path, s.locator);
        }
    }
}

async fn delete(settings: &Settings, source: &str) -> Result<ExitCode> {
    let index = open_index(settings).await?;
    // ingestion stores canonical paths; a file that no longer exists is matched as typed
    let source = std::fs::canonicalize(source)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| source.to_string());
    let mut removed = index.delete_source(&source).await?;
    if removed == 0 {
        removed = index.delete(&source).await?;
    }
    println!("🗑️  Removed {} entries for {}", removed, source);
    Ok(ExitCode::SUCCESS)
}

async fn status(settings: &Settings) -> Result<ExitCode> {
    let index = open_index(settings).await?;
    let info = index.info();
    println!("Index:      {}", settings.data.index_dir().display());
    println!("Entries:    {}", info.entries);
    println!("Documents:  {}", info.documents);
    println!("Sources:    {}", info.sources);
    println!("Dimension:  {}", info.dimension);
    println!("Embedder:   {}", info.embedder_id);
    Ok(ExitCode::SUCCESS)
}

async fn open_index(settings: &Settings) -> Result<VectorIndex> {
    let index_dir = settings.data.index_dir();
    VectorIndex::open_existing(&index_dir, &settings.data.table, settings.embedding.dimension)
        .await
        .with_context(|| format!("opening index at {}", index_dir.display()))
}
