//! CLI binary for edgequake-qpgen.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig`, asks for the API key when it is missing, and prints
//! the paper.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_qpgen::{
    extract_document, generate_paper, write_atomic, AttemptError, GenerationConfig,
    GenerationProgressCallback, PaperOutput, ProgressCallback, QuestionPattern,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the backend being tried,
/// plus one log line per failed attempt.
struct CliProgressCallback {
    spinner: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        spinner.set_prefix("Reading");
        spinner.set_message("Extracting document text…");
        spinner.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            spinner,
            failures: AtomicUsize::new(0),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_document_loaded(&self, document_chars: usize, chunks: usize, excerpt_chars: usize) {
        self.spinner.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold("Document loaded"),
            dim(&format!(
                "{document_chars} chars, {chunks} chunks, {excerpt_chars} sent"
            )),
        ));
    }

    fn on_attempt_start(&self, backend: &str, index: usize, total: usize) {
        self.spinner.set_prefix("Generating");
        self.spinner
            .set_message(format!("{backend} {}", dim(&format!("({index}/{total})"))));
    }

    fn on_attempt_failed(&self, backend: &str, error: &AttemptError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        let msg = truncate(&error.to_string(), 90);
        let marker = if error.is_expected() {
            yellow("↷")
        } else {
            red("✗")
        };
        let label = if error.is_expected() {
            yellow("quota")
        } else {
            red("error")
        };
        self.spinner
            .println(format!("  {marker} {backend:<24} {label}  {}", dim(&msg)));
    }

    fn on_generation_complete(&self, backend: &str, text_len: usize) {
        self.spinner.finish_and_clear();
        let fallbacks = self.failures.load(Ordering::SeqCst);
        eprintln!(
            "{} Paper generated by {}  {}",
            green("✔"),
            bold(backend),
            dim(&format!(
                "{text_len} bytes{}",
                if fallbacks > 0 {
                    format!(", {fallbacks} fallback(s)")
                } else {
                    String::new()
                }
            )),
        );
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Default pattern (10 × 2 marks, 5 × 5 marks, 2 × 10 marks) to stdout
  qpgen biology-notes.pdf

  # Save to a file
  qpgen notes.docx -o question_paper.txt

  # Custom pattern
  qpgen --two 5 --five 4 --ten 1 chapter3.txt

  # Free-text instructions instead of a pattern
  qpgen --instructions "10 MCQs and 3 long answers on thermodynamics" physics.pdf

  # Restrict the fallback list
  qpgen --model gemini-2.0-flash --model gemini-1.5-flash notes.pdf

  # Another edgequake-llm provider
  qpgen --provider openai --model gpt-4.1-mini --model gpt-4.1-nano notes.pdf

  # Inspect what would be sent (no API key needed)
  qpgen --extract-only notes.pdf

  # JSON output with backend and attempt details
  qpgen --json notes.pdf > paper.json

DEFAULT BACKENDS (tried in order):
  gemini-2.0-flash → gemini-2.0-flash-lite → gemini-1.5-flash → gemini-1.5-pro

  A backend whose quota is exhausted (HTTP 429 / RESOURCE_EXHAUSTED) is
  skipped silently; the run only fails when every backend has failed.

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Google Generative AI key (checked first)
  GEMINI_API_KEY          Alternative name for the same key
  OPENAI_API_KEY, ...     Keys for --provider backends
  PDFIUM_LIB_PATH         Path to libpdfium (else ./ or the system library)
  RUST_LOG                Log filter, overrides -v/-q
  QPGEN_*                 Every flag, e.g. QPGEN_MODELS, QPGEN_TWO
"#;

/// Generate exam question papers from PDF, DOCX and text documents.
#[derive(Parser, Debug)]
#[command(
    name = "qpgen",
    version,
    about = "Generate exam question papers from documents using LLMs",
    long_about = "Generate an exam question paper from a PDF, DOCX or text document (local \
file or URL). Models are tried in order; quota-exhausted models are skipped until one \
answers.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document path or HTTP/HTTPS URL.
    input: String,

    /// Write the paper to this file instead of stdout.
    #[arg(short, long, env = "QPGEN_OUTPUT")]
    output: Option<PathBuf>,

    /// Model to try; repeat to build the fallback list (first is primary).
    #[arg(
        long = "model",
        env = "QPGEN_MODELS",
        value_delimiter = ',',
        long_help = "Model identifier to try. Repeat (or comma-separate) to build the ordered \
          fallback list.\nDefault: gemini-2.0-flash, gemini-2.0-flash-lite, gemini-1.5-flash, \
          gemini-1.5-pro."
    )]
    models: Vec<String>,

    /// Use an edgequake-llm provider (openai, anthropic, ollama, …) instead of Gemini.
    #[arg(long, env = "QPGEN_PROVIDER")]
    provider: Option<String>,

    /// Google Generative AI key (else GOOGLE_API_KEY / GEMINI_API_KEY).
    #[arg(long, env = "QPGEN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number of 2-mark questions (0–20).
    #[arg(long, env = "QPGEN_TWO", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(0..=20))]
    two: u32,

    /// Number of 5-mark questions (0–10).
    #[arg(long, env = "QPGEN_FIVE", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    five: u32,

    /// Number of 10-mark questions (0–5).
    #[arg(long, env = "QPGEN_TEN", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(0..=5))]
    ten: u32,

    /// Free-text instructions replacing the question pattern.
    #[arg(long, env = "QPGEN_INSTRUCTIONS")]
    instructions: Option<String>,

    /// Characters of the document sent to the model.
    #[arg(long, env = "QPGEN_EXCERPT_CHARS", default_value_t = 15_000)]
    excerpt_chars: usize,

    /// Splitter chunk size in characters.
    #[arg(long, env = "QPGEN_CHUNK_SIZE", default_value_t = 2000)]
    chunk_size: usize,

    /// Overlap between chunks in characters.
    #[arg(long, env = "QPGEN_CHUNK_OVERLAP", default_value_t = 200)]
    chunk_overlap: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "QPGEN_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "QPGEN_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Per-backend call timeout in seconds.
    #[arg(long, env = "QPGEN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "QPGEN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "QPGEN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Keep the model output exactly as returned.
    #[arg(long, env = "QPGEN_NO_POLISH")]
    no_polish: bool,

    /// Output structured JSON (PaperOutput) instead of plain text.
    #[arg(long, env = "QPGEN_JSON")]
    json: bool,

    /// Print the excerpt that would be sent, without calling any model.
    #[arg(long)]
    extract_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "QPGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "QPGEN_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "QPGEN_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers what INFO logs would say, so they are muted while
    // it runs.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let config = build_config(&cli, None, None).await?;
        let doc = extract_document(&cli.input, &config)
            .await
            .context("Failed to read document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).context("Failed to serialise excerpt")?
            );
        } else {
            println!("{}", doc.excerpt);
            if !cli.quiet {
                eprintln!(
                    "{}",
                    dim(&format!(
                        "{} ({}): {} chars, {} chunks, {} chars excerpted",
                        doc.info.name,
                        doc.info.kind,
                        doc.info.document_chars,
                        doc.info.chunks,
                        doc.info.excerpt_chars
                    ))
                );
            }
        }
        return Ok(());
    }

    // ── Credentials ──────────────────────────────────────────────────────
    let api_key = if cli.provider.is_none() {
        resolve_api_key(&cli)?
    } else {
        None
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, api_key, progress_cb).await?;

    // ── Generate ─────────────────────────────────────────────────────────
    let output = generate_paper(&cli.input, &config)
        .await
        .context("Question paper generation failed")?;

    if let Some(ref output_path) = cli.output {
        let rendered = render(&output, cli.json)?;
        write_atomic(output_path, &rendered).await?;
        if !cli.quiet {
            eprintln!(
                "{}  {}  {}ms  →  {}",
                green("✔"),
                output.generation.backend,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let rendered = render(&output, cli.json)?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }

        if !cli.quiet && !show_progress && !cli.json {
            eprintln!(
                "Generated by {} after {} attempt(s) in {}ms",
                output.generation.backend, output.stats.attempts, output.stats.total_duration_ms
            );
        }
    }

    Ok(())
}

/// Flag or environment first; on a terminal, ask.
fn resolve_api_key(cli: &Cli) -> Result<Option<String>> {
    if let Some(ref key) = cli.api_key {
        if !key.trim().is_empty() {
            return Ok(Some(key.trim().to_string()));
        }
    }
    if edgequake_qpgen::ApiKey::from_env().is_some() {
        return Ok(None);
    }
    if !io::stdin().is_terminal() {
        // The library reports MissingApiKey with setup hints.
        return Ok(None);
    }

    // Echo is disabled so the key never appears on screen.
    prompt_api_key(|prompt| rpassword::prompt_password(prompt))
}

fn prompt_api_key<F>(read_secret: F) -> Result<Option<String>>
where
    F: FnOnce(String) -> io::Result<String>,
{
    let line = read_secret(format!("{} Google API key: ", cyan("?")))
        .context("Failed to read API key from terminal")?;
    let key = line.trim();
    Ok((!key.is_empty()).then(|| key.to_string()))
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(
    cli: &Cli,
    api_key: Option<String>,
    progress: Option<ProgressCallback>,
) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .excerpt_chars(cli.excerpt_chars)
        .polish(!cli.no_polish)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    let models = parse_models(&cli.models);
    if !models.is_empty() {
        builder = builder.backends(models);
    }

    builder = match cli.instructions.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => builder.custom_instructions(text),
        _ => builder.pattern(QuestionPattern::new(cli.two, cli.five, cli.ten)),
    };

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Trim model ids and drop blanks (`--model a, --model ""` from env splitting).
fn parse_models(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn render(output: &PaperOutput, json: bool) -> Result<String> {
    if json {
        serde_json::to_string_pretty(output).context("Failed to serialise output")
    } else {
        Ok(output.text.clone())
    }
}
