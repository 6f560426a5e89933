//! CLI binary for repodoc.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AssemblyConfig`, shows the live log feed, and asks where to save.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use repodoc::{
    run_pipeline, AssemblyConfig, AssemblyOutcome, AssemblyProgressCallback, AssemblyStats,
    FixedDestination, OutputFormat, OutputStream, ProgressCallback, SaveDestination,
    SectionSeparator, Stage,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
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

/// Spinner anchored at the bottom of the terminal; subprocess output and
/// per-section results scroll above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl AssemblyProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_log_line(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => self.bar.println(format!("  {}", dim(line))),
            OutputStream::Stderr => self.bar.println(format!("  {}", red(line))),
        }
    }

    fn on_fragment_start(&self, name: &str, index: usize, total: usize) {
        self.bar.set_message(format!("{name} ({index}/{total})"));
    }

    fn on_fragment_complete(&self, name: &str, rank: u32, diagrams: usize) {
        let detail = match diagrams {
            0 => format!("rank {rank}"),
            1 => format!("rank {rank}, 1 diagram"),
            n => format!("rank {rank}, {n} diagrams"),
        };
        self.bar
            .println(format!("  {} {:<36} {}", green("✓"), name, dim(&detail)));
    }

    fn on_diagram_rendered(&self, fragment: &str, block: usize, _image_bytes: usize) {
        self.bar.set_message(format!("{fragment}: diagram {block}"));
    }

    fn on_run_complete(&self, stats: &AssemblyStats) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} sections, {} diagrams",
            green("✔"),
            bold(&stats.fragment_count.to_string()),
            stats.diagram_count,
        );
    }
}

impl CliProgressCallback {
    /// Clear the spinner on failure so the error prints on a clean line.
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

/// Plain live log feed for `--no-progress`.
struct EchoCallback;

impl AssemblyProgressCallback for EchoCallback {
    fn on_stage(&self, stage: Stage) {
        eprintln!("{} {}", cyan("◆"), bold(&stage.to_string()));
    }

    fn on_log_line(&self, _stream: OutputStream, line: &str) {
        eprintln!("  {line}");
    }
}

// ── Save destination ─────────────────────────────────────────────────────────

/// Asks for a path on the terminal; an empty answer declines.
struct TerminalPrompt {
    bar: Option<ProgressBar>,
}

impl TerminalPrompt {
    fn ask(suggested: &Path) -> Option<PathBuf> {
        eprint!(
            "{} Save as [{}] (empty to cancel, '.' for suggested): ",
            cyan("?"),
            suggested.display()
        );
        io::stderr().flush().ok();

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).ok()?;
        match answer.trim() {
            "" => None,
            "." => Some(suggested.to_path_buf()),
            path => Some(PathBuf::from(path)),
        }
    }
}

#[async_trait]
impl SaveDestination for TerminalPrompt {
    async fn choose(&self, suggested: &Path) -> Option<PathBuf> {
        tokio::task::block_in_place(|| match self.bar {
            Some(ref bar) => bar.suspend(|| Self::ask(suggested)),
            None => Self::ask(suggested),
        })
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate, assemble and save interactively
  repodoc https://github.com/psf/requests

  # Save straight to a file
  repodoc https://github.com/psf/requests -o docs/requests.docx

  # Re-assemble an existing app/docs/ without running the generator
  repodoc --skip-generate https://github.com/psf/requests -o requests.docx

  # HTML output, no pandoc needed
  repodoc --skip-generate --format html https://github.com/psf/requests -o requests.html

  # Custom generator
  repodoc --generator ./gen.sh --generator-arg --url https://host/owner/repo

EXTERNAL PROGRAMS:
  python3   runs the generator (app/run-pipeline.py --repo <URL>)
  mmdc      renders ```mermaid blocks (npm install -g @mermaid-js/mermaid-cli)
  pandoc    converts the HTML to .docx; --reference-doc supplies Word styles

ENVIRONMENT VARIABLES:
  Flags other than --generator-arg have a REPODOC_* fallback, e.g. REPODOC_RENDERER=/opt/bin/mmdc.
  RUST_LOG overrides the log filter.
"#;

/// Assemble generated repository documentation into one document.
#[derive(Parser, Debug)]
#[command(
    name = "repodoc",
    version,
    about = "Assemble generated repository documentation into one styled document",
    long_about = "Runs the documentation generator for a repository, then merges its Markdown \
sections into a single document: duplicate titles removed, Mermaid diagrams rendered to images, \
sections in a fixed order, cover page added, converted to .docx with pandoc.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Repository URL passed to the generator; also names the document.
    repo_url: String,

    /// Save to this path instead of asking.
    #[arg(short, long, env = "REPODOC_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "REPODOC_FORMAT", value_enum, default_value = "docx")]
    format: FormatArg,

    /// Assemble the existing output directory; do not run the generator.
    #[arg(long, env = "REPODOC_SKIP_GENERATE")]
    skip_generate: bool,

    /// Directory the generator runs in.
    #[arg(long, env = "REPODOC_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Fragment directory, relative to --workdir unless absolute.
    #[arg(long, env = "REPODOC_DOCS_DIR", default_value = "app/docs")]
    docs_dir: PathBuf,

    /// Generator program.
    #[arg(long, env = "REPODOC_GENERATOR", default_value = "python3")]
    generator: String,

    /// Generator argument placed before the repository URL; repeatable.
    /// Default: app/run-pipeline.py --repo
    #[arg(long = "generator-arg", allow_hyphen_values = true)]
    generator_args: Vec<String>,

    /// Diagram renderer program (mermaid-cli).
    #[arg(long, env = "REPODOC_RENDERER", default_value = "mmdc")]
    renderer: String,

    /// Rendered diagram width in pixels.
    #[arg(long, env = "REPODOC_DIAGRAM_WIDTH", default_value_t = 1200,
          value_parser = clap::value_parser!(u32).range(1..))]
    diagram_width: u32,

    /// Rendered diagram background colour.
    #[arg(long, env = "REPODOC_DIAGRAM_BACKGROUND", default_value = "white")]
    diagram_background: String,

    /// Diagrams of one section rendered at the same time.
    #[arg(long, env = "REPODOC_RENDER_CONCURRENCY", default_value_t = 1)]
    render_concurrency: usize,

    /// Separator between sections.
    #[arg(long, env = "REPODOC_SEPARATOR", value_enum, default_value = "blank")]
    separator: SeparatorArg,

    /// Generator timeout in seconds (0 = none).
    #[arg(long, env = "REPODOC_GENERATOR_TIMEOUT", default_value_t = 1800)]
    generator_timeout: u64,

    /// Per-diagram renderer timeout in seconds (0 = none).
    #[arg(long, env = "REPODOC_RENDER_TIMEOUT", default_value_t = 120)]
    render_timeout: u64,

    /// Document converter program.
    #[arg(long, env = "REPODOC_PANDOC", default_value = "pandoc")]
    pandoc: String,

    /// Word document whose styles .docx output copies.
    #[arg(long, env = "REPODOC_REFERENCE_DOC")]
    reference_doc: Option<PathBuf>,

    /// Print the run outcome as JSON on stdout.
    #[arg(long, env = "REPODOC_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "REPODOC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "REPODOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the save prompt.
    #[arg(short, long, env = "REPODOC_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Docx,
    Html,
    Md,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Docx => OutputFormat::Docx,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Md => OutputFormat::Markdown,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SeparatorArg {
    Blank,
    Hr,
    PageBreak,
}

impl From<SeparatorArg> for SectionSeparator {
    fn from(v: SeparatorArg) -> Self {
        match v {
            SeparatorArg::Blank => SectionSeparator::BlankLine,
            SeparatorArg::Hr => SectionSeparator::HorizontalRule,
            SeparatorArg::PageBreak => SectionSeparator::PageBreak,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the feedback; library logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = match spinner {
        Some(ref cb) => Some(Arc::clone(cb) as Arc<dyn AssemblyProgressCallback>),
        None if !cli.quiet => Some(Arc::new(EchoCallback)),
        None => None,
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = match cli.output {
        Some(ref path) => run_pipeline(&cli.repo_url, &config, &FixedDestination(path.clone())).await,
        None => {
            let prompt = TerminalPrompt {
                bar: spinner.as_ref().map(|cb| cb.bar.clone()),
            };
            run_pipeline(&cli.repo_url, &config, &prompt).await
        }
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(ref cb) = spinner {
                cb.abandon();
            }
            let category = e.category();
            return Err(e).with_context(|| format!("Documentation run failed ({category:?})"));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
        return Ok(());
    }

    match outcome {
        AssemblyOutcome::Saved { ref path, ref stats } => {
            if !cli.quiet {
                eprintln!(
                    "{}  {} bytes  {}ms  →  {}",
                    green("✔"),
                    stats.output_bytes,
                    stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
            }
        }
        AssemblyOutcome::UserCancelled { .. } => {
            eprintln!("{} not saved", cyan("⚠"));
        }
    }

    Ok(())
}

/// Map CLI args to `AssemblyConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AssemblyConfig> {
    let mut builder = AssemblyConfig::builder()
        .generator_program(&cli.generator)
        .output_dir(&cli.docs_dir)
        .generator_timeout_secs(cli.generator_timeout)
        .renderer_program(&cli.renderer)
        .diagram_width(cli.diagram_width)
        .diagram_background(&cli.diagram_background)
        .render_timeout_secs(cli.render_timeout)
        .render_concurrency(cli.render_concurrency)
        .converter_program(&cli.pandoc)
        .section_separator(cli.separator.into())
        .output_format(cli.format.into())
        .skip_generation(cli.skip_generate);

    if !cli.generator_args.is_empty() {
        builder = builder.generator_args(&cli.generator_args);
    }
    if let Some(ref doc) = cli.reference_doc {
        builder = builder.reference_doc(doc);
    }
    if let Some(ref dir) = cli.workdir {
        builder = builder.working_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
