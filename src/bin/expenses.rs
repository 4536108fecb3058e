//! CLI binary for edgequake-expenses.
//!
//! A thin shim over the library crate that maps CLI flags (or their
//! environment variables) to `PipelineConfig`, runs one phase and prints its
//! summary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_expenses::{
    extract_invoices, file_expenses, review_store, CategoryResolver, ExtractionSummary,
    FilingOutcome, FilingSummary, Phase, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, StoreReview,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per document.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Wall-clock start of the item currently being processed.
    started: Mutex<Option<Instant>>,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner only until `on_phase_start` tells us the batch size.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading folder…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, phase: Phase, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} invoices  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix(match phase {
            Phase::Extraction => "Extracting",
            Phase::Filing => "Filing",
        });
        self.bar.reset_eta();
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_phase_start(&self, phase: Phase, total: usize) {
        self.activate_bar(phase, total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{phase}: {total} invoices…"))
        ));
    }

    fn on_item_start(&self, _index: usize, _total: usize, filename: &str) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(filename.to_string());
    }

    fn on_item_complete(&self, index: usize, total: usize, filename: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            filename,
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_item_skipped(&self, index: usize, total: usize, filename: &str, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            filename,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_phase_complete(&self, phase: Phase, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        let mark = if failed == 0 {
            green("✔")
        } else if success_count == 0 {
            red("✘")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{} {}: {}/{} invoices  ({} skipped or failed)",
            mark,
            phase,
            bold(&success_count.to_string()),
            total,
            self.skipped.load(Ordering::SeqCst),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # 1. Extract every PDF in the attachments folder into temp/expenses.json
  expenses extract

  # 2. Check categories before filing
  expenses review

  # 3. File the reviewed expenses and archive the PDFs
  expenses file

  # Use another model / provider for extraction
  expenses --model gpt-4.1 --provider openai extract

  # Machine-readable summaries
  expenses --json file > filing.json

SETUP:
  cp config/category_mappings.example.toml config/category_mappings.toml
  cp prompt.txt.example prompt.txt
  export OPENAI_API_KEY=sk-...

ENVIRONMENT VARIABLES:
  EMAIL_ATTACHMENTS_FOLDER  Folder with incoming PDF invoices
  DROPBOX_FOLDER            Archive root for filed invoices
  COMPANY_NAME              Company name used in archive folder names
  CODE_ROOT                 Working root (temp/expenses.json, prompt.txt)
  QUADERNO_API_URL          Accounting API base URL
  QUADERNO_API_KEY          Accounting API key
  CATEGORY_MAPPINGS         Category mapping file (TOML)
  EXPENSES_PROMPT           Prompt template file
  EDGEQUAKE_PROVIDER        LLM provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL           LLM model ID (default gpt-4)
  OPENAI_API_KEY            OpenAI API key
  ANTHROPIC_API_KEY         Anthropic API key
  PDFIUM_LIB_PATH           Path to an existing libpdfium (skips auto-download)
"#;

/// Turn emailed PDF invoices into accounting expenses.
#[derive(Parser, Debug)]
#[command(
    name = "expenses",
    version,
    about = "Turn emailed PDF invoices into accounting expenses",
    long_about = "Extract structured data from PDF invoices with an LLM, review it, then file \
each invoice as an expense in a Quaderno-style accounting API and move the PDF into a dated \
archive folder.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder with incoming PDF invoices.
    #[arg(long, global = true, env = "EMAIL_ATTACHMENTS_FOLDER")]
    input_dir: Option<PathBuf>,

    /// Archive root for filed invoices.
    #[arg(long, global = true, env = "DROPBOX_FOLDER")]
    archive_root: Option<PathBuf>,

    /// Company name used in archive folder names.
    #[arg(long, global = true, env = "COMPANY_NAME")]
    company: Option<String>,

    /// Working root holding temp/expenses.json and prompt.txt.
    #[arg(long, global = true, env = "CODE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Accounting API base URL.
    #[arg(long, global = true, env = "QUADERNO_API_URL")]
    api_url: Option<String>,

    /// Accounting API key.
    #[arg(long, global = true, env = "QUADERNO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Category mapping file (TOML).
    #[arg(
        long,
        global = true,
        env = "CATEGORY_MAPPINGS",
        default_value = "config/category_mappings.toml"
    )]
    categories: PathBuf,

    /// Prompt template file. Default: <root>/prompt.txt.
    #[arg(long, global = true, env = "EXPENSES_PROMPT")]
    prompt: Option<PathBuf>,

    /// LLM model ID.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Accounting API timeout in seconds.
    #[arg(long, global = true, env = "EXPENSES_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Print the phase summary as JSON on stdout.
    #[arg(long, global = true, env = "EXPENSES_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "EXPENSES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "EXPENSES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "EXPENSES_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Extract every PDF in the input folder into the intermediate store.
    Extract,
    /// Summarise the intermediate store and flag unknown categories.
    Review,
    /// File every stored record as an expense and archive its PDF.
    File,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-invoice feedback, so INFO logs are
    // muted while it is shown.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && cli.command != Command::Review;
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

    match cli.command {
        Command::Review => run_review(&cli),
        Command::Extract => {
            ensure_pdfium(cli.quiet)?;
            let config = build_config(&cli, progress_callback(show_progress))?;
            let summary = extract_invoices(&config)
                .await
                .context("Extraction failed")?;
            report_extraction(&cli, &summary)
        }
        Command::File => {
            let config = build_config(&cli, progress_callback(show_progress))?;
            let outcome = file_expenses(&config).await.context("Filing failed")?;
            report_filing(&cli, &outcome)
        }
    }
}

fn progress_callback(show: bool) -> Option<ProgressCallback> {
    show.then(|| CliProgressCallback::new_dynamic() as Arc<dyn PipelineProgressCallback>)
}

/// Make sure the pdfium library is available before the first document is
/// opened; on the very first run this downloads it into the user cache.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() || quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to load PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .store_root(&cli.root)
        .category_config(&cli.categories)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref dir) = cli.input_dir {
        builder = builder.input_dir(dir);
    }
    if let Some(ref dir) = cli.archive_root {
        builder = builder.archive_root(dir);
    }
    if let Some(ref name) = cli.company {
        builder = builder.company_name(name);
    }
    if let Some(ref url) = cli.api_url {
        builder = builder.api_url(url);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref path) = cli.prompt {
        builder = builder.prompt_path(path);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn run_review(cli: &Cli) -> Result<()> {
    let categories = CategoryResolver::load(&cli.categories)?;
    let store_path = cli.root.join("temp").join("expenses.json");
    let review = review_store(&store_path, &categories)?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&review).context("Failed to serialise review")?
        );
        return Ok(());
    }

    match review {
        None => eprintln!("No expenses.json file found. Run extraction first."),
        Some(review) => print_review(&review),
    }
    Ok(())
}

fn print_review(review: &StoreReview) {
    println!("{} expenses in store", bold(&review.total.to_string()));
    for (label, count) in &review.by_category {
        let shown = if label.is_empty() { "(none)" } else { label.as_str() };
        let mark = if review.unknown_categories.contains_key(label) {
            red("✗")
        } else {
            green("✓")
        };
        println!("  {} {:<24} {:>4}", mark, shown, count);
    }
    if review.has_unknown() {
        println!(
            "{} {} categories have no mapping and will be skipped when filing",
            yellow("⚠"),
            review.unknown_categories.len()
        );
    }
}

fn report_extraction(cli: &Cli, summary: &ExtractionSummary) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).context("Failed to serialise summary")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }
    eprintln!(
        "{}  {}/{} invoices  →  {}",
        if summary.failed == 0 { green("✔") } else { cyan("⚠") },
        summary.extracted,
        summary.total,
        bold(&summary.store_path.display().to_string()),
    );
    for failure in &summary.failures {
        eprintln!("   {} {}", red("✗"), dim(&failure.to_string()));
    }
    Ok(())
}

fn report_filing(cli: &Cli, outcome: &FilingOutcome) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(outcome).context("Failed to serialise summary")?
        );
        return Ok(());
    }
    match outcome {
        FilingOutcome::StoreMissing { .. } => {
            eprintln!("No expenses.json file found. Run extraction first.");
        }
        FilingOutcome::Completed(summary) if !cli.quiet => print_filing(summary),
        FilingOutcome::Completed(_) => {}
    }
    Ok(())
}

fn print_filing(summary: &FilingSummary) {
    let clean = summary.failed == 0 && summary.skipped == 0;
    eprintln!(
        "{}  {} filed  {} skipped  {} failed  (of {})",
        if clean { green("✔") } else { cyan("⚠") },
        bold(&summary.filed.to_string()),
        summary.skipped,
        summary.failed,
        summary.total,
    );
    if summary.unarchived > 0 {
        eprintln!(
            "   {} {} filed without archiving (PDF not found)",
            yellow("⚠"),
            summary.unarchived
        );
    }
    for error in &summary.errors {
        eprintln!("   {} {}", red("✗"), dim(&error.to_string()));
    }
}
