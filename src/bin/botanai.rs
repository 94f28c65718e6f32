//! CLI binary for botanai.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, drives a `Session`, and prints results.

use anyhow::{Context, Result};
use botanai::{
    resolve_api_key, AnalysisConfig, AnalysisProgressCallback, FileBackend, HealthStatus,
    HistorySummary, ImageBudget, Language, MockFallback, NormalizedImage, PlantAnalysis,
    ProgressCallback, Session,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while the image is prepared and the model answers.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.green} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.set_message("Preparing image…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_image_ready(&self, image: &NormalizedImage) {
        self.bar.println(format!(
            "  {} Image {}x{}  {}",
            green("✓"),
            image.width,
            image.height,
            dim(&format!(
                "~{} KB, {} pass{}",
                image.estimated_bytes() / 1024,
                image.passes,
                if image.passes == 1 { "" } else { "es" }
            )),
        ));
    }

    fn on_request_start(&self, model: &str) {
        self.bar.set_message(format!("Asking {model}…"));
    }

    fn on_fallback(&self, reason: &str) {
        self.bar
            .println(format!("  {} {}", yellow("⚠"), yellow(&format!("Using mock analysis: {reason}"))));
    }

    fn on_complete(&self, _analysis: &PlantAnalysis) {
        self.bar.finish_and_clear();
    }

    fn on_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Identify a plant (English)
  botanai analyze monstera.jpg

  # French output, JSON record on stdout
  botanai analyze --lang fr --json ficus.png

  # Go through a server-side proxy that holds the key
  botanai analyze --endpoint http://localhost:3000/api/claude leaf.webp

  # Demo without a key
  botanai analyze --mock-fallback pothos.jpg

  # Browse history
  botanai history list
  botanai history show 3f6c0d1e-...
  botanai history clear

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       API key (also: CLAUDE_API_KEY, API_KEY_CLAUDE,
                          VITE_API_KEY_CLAUDE, VITE_CLAUDE_API_KEY, API_KEY;
                          first non-empty wins)
  BOTANAI_HISTORY_FILE    History location (default: <data dir>/botanai/botanai_history.json)
  RUST_LOG                Log filter, overrides --verbose/--quiet
"#;

/// Identify plants and diagnose their health from a photo.
#[derive(Parser, Debug)]
#[command(
    name = "botanai",
    version,
    about = "Identify plants and diagnose their health from a photo using a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// History file.
    #[arg(long, global = true, env = "BOTANAI_HISTORY_FILE")]
    history_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BOTANAI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "BOTANAI_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse a plant photo and add the result to history.
    Analyze(AnalyzeArgs),

    /// Inspect or clear the analysis history.
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Image file path or data:image/...;base64,... URL.
    input: String,

    /// Output language: en or fr.
    #[arg(short, long, env = "BOTANAI_LANG", default_value = "en")]
    lang: String,

    /// Model identifier.
    #[arg(long, env = "BOTANAI_MODEL")]
    model: Option<String>,

    /// Messages endpoint (or a proxy in front of it).
    #[arg(long, env = "BOTANAI_ENDPOINT")]
    endpoint: Option<String>,

    /// Max output tokens.
    #[arg(long, env = "BOTANAI_MAX_TOKENS", default_value_t = 800)]
    max_tokens: usize,

    /// Path to a text file replacing the built-in instruction.
    #[arg(long, env = "BOTANAI_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Upload byte budget.
    #[arg(long, env = "BOTANAI_MAX_BYTES", default_value_t = 2 * 1024 * 1024)]
    max_bytes: usize,

    /// Longest image side after normalisation.
    #[arg(long, env = "BOTANAI_MAX_DIMENSION", default_value_t = 1600)]
    max_dimension: u32,

    /// Return a canned record when no key is configured or the model is unknown.
    #[arg(long, env = "BOTANAI_MOCK_FALLBACK")]
    mock_fallback: bool,

    /// Do not store the normalised image in the history record.
    #[arg(long, env = "BOTANAI_NO_IMAGE")]
    no_image: bool,

    /// Request timeout in seconds (default: transport default).
    #[arg(long, env = "BOTANAI_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Print the record as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "BOTANAI_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// List past analyses, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one analysis by id.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete every record.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback during an analysis; keep library
    // logs down to errors unless asked.
    let spinner = match &cli.command {
        Command::Analyze(a) => !cli.quiet && !a.no_progress && !a.json,
        Command::History(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let history_path = cli
        .history_file
        .clone()
        .unwrap_or_else(botanai::default_history_path);
    let backend = Arc::new(FileBackend::new(&history_path));

    match cli.command {
        Command::Analyze(ref args) => {
            let progress: Option<ProgressCallback> = if spinner && !cli.verbose {
                Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
            } else {
                None
            };
            let config = build_config(args, progress).await?;
            let session = Session::open(config, backend).await;

            let record = session.analyze(&args.input).await.context("Analysis failed")?;

            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&record).context("Failed to serialise record")?
                );
            } else {
                print_analysis(&record);
                if !cli.quiet {
                    eprintln!("{}", dim(&format!("saved to {}", history_path.display())));
                }
            }
        }
        Command::History(ref cmd) => {
            let session = Session::open(AnalysisConfig::default(), backend).await;
            run_history(&session, cmd).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(args: &AnalyzeArgs, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let language: Language = args.lang.parse().context("Invalid --lang")?;

    let mut builder = AnalysisConfig::builder()
        .language(language)
        .max_tokens(args.max_tokens)
        .budget(ImageBudget {
            max_bytes: args.max_bytes,
            max_dimension: args.max_dimension,
            ..ImageBudget::default()
        })
        .mock_fallback(if args.mock_fallback {
            MockFallback::Enabled
        } else {
            MockFallback::Disabled
        })
        .retain_image(!args.no_image);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref endpoint) = args.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(key) = resolve_api_key() {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_history(session: &Session, cmd: &HistoryCommand) -> Result<()> {
    match cmd {
        HistoryCommand::List { json } => {
            let summaries = session.summaries().await;
            if *json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                eprintln!("{}", dim("No analyses yet."));
            } else {
                for s in &summaries {
                    print_summary(s);
                }
            }
        }
        HistoryCommand::Show { id, json } => {
            let record = session
                .find(id)
                .await
                .with_context(|| format!("No analysis with id '{id}'"))?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_analysis(&record);
            }
        }
        HistoryCommand::Clear => {
            let n = session.summaries().await.len();
            session.clear_history().await.context("Failed to clear history")?;
            eprintln!("{} removed {} record{}", green("✔"), n, if n == 1 { "" } else { "s" });
        }
    }
    Ok(())
}

fn status_badge(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => green("● Healthy"),
        HealthStatus::Sick => red("● Sick"),
        HealthStatus::Unknown => yellow("● Unknown"),
    }
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn print_summary(s: &HistorySummary) {
    println!(
        "{}  {}  {:<28} {}{}",
        dim(&s.id),
        format_timestamp(s.timestamp),
        s.common_name,
        status_badge(s.health_status),
        if s.source == botanai::AnalysisSource::Mock {
            dim(" (mock)")
        } else {
            String::new()
        },
    );
}

fn print_analysis(r: &PlantAnalysis) {
    println!(
        "{}  {}",
        bold(&r.common_name),
        dim(&format!("{}  ·  {:.0}% confidence", r.scientific_name, r.confidence * 100.0))
    );
    println!("{}  {}", status_badge(r.health_status), r.diagnosis);
    if r.is_mock() {
        println!("{}", yellow("(mock result: no inference was performed)"));
    }
    if !r.symptoms.is_empty() {
        println!("\n{}", bold("Symptoms"));
        for s in &r.symptoms {
            println!("  - {s}");
        }
    }
    if !r.treatment.is_empty() {
        println!("\n{}", bold("Treatment"));
        for (i, step) in r.treatment.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
    }
    let care = &r.care_instructions;
    println!("\n{}", bold("Care"));
    println!("  Water        {}", care.water);
    println!("  Light        {}", care.light);
    println!("  Temperature  {}", care.temperature);
    println!("  Humidity     {}", care.humidity);
    if !r.fun_fact.is_empty() {
        println!("\n{} {}", dim("Did you know?"), r.fun_fact);
    }
    println!("{}", dim(&format!("\nid {}  ·  {}", r.id, format_timestamp(r.timestamp))));
}
