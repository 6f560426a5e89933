//! # repodoc
//!
//! Assemble generated Markdown documentation fragments into one styled,
//! diagram-rendered document.
//!
//! An upstream generator (a black box run as a subprocess) writes one
//! Markdown file per documentation section. This crate takes those files,
//! strips a duplicated leading title, rasterises every fenced Mermaid
//! diagram into an inline image, puts the sections in a canonical order,
//! adds a cover page, and hands the result to pandoc for `.docx` output.
//!
//! ## Pipeline Overview
//!
//! ```text
//! repo URL
//!  │
//!  ├─ 1. Generate  run the generator, stream its output, verify app/docs/
//!  ├─ 2. Collect   list *.md fragments in filename order
//!  ├─ 3. Normalise drop a repeated top-level heading
//!  ├─ 4. Render    ```mermaid blocks → mmdc → PNG → data: URI
//!  ├─ 5. Order     title → rank (overview, setup, tech, architecture, keys, rest)
//!  ├─ 6. Merge     cover page + sections + stylesheet
//!  ├─ 7. Convert   pandoc HTML → docx (or emit HTML / Markdown directly)
//!  └─ 8. Save      ask for a destination; declining is not an error
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use repodoc::{run_pipeline, AssemblyConfig, FixedDestination};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AssemblyConfig::default();
//!     let outcome = run_pipeline(
//!         "https://github.com/psf/requests",
//!         &config,
//!         &FixedDestination("requests_documentation.docx".into()),
//!     )
//!     .await?;
//!     eprintln!("{} sections", outcome.stats().fragment_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `repodoc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External Programs
//!
//! | Stage | Default | Needed when |
//! |-------|---------|-------------|
//! | generate | `python3 app/run-pipeline.py --repo <URL>` | generation is not skipped |
//! | render | `mmdc` (mermaid-cli) | a fragment contains a diagram block |
//! | convert | `pandoc` | output format is `docx` |
//!
//! Every external call goes through [`CommandRunner`], so tests and
//! embedders can substitute their own.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{assemble_directory, run_pipeline, run_pipeline_with};
pub use config::{
    AssemblyConfig, AssemblyConfigBuilder, ConverterSettings, GeneratorSettings, OutputFormat,
    RendererSettings, SectionSeparator,
};
pub use error::{ErrorCategory, RepodocError};
pub use export::{
    persist, suggested_filename, DeclineDestination, DocumentConverter, FixedDestination,
    PandocConverter, PassthroughConverter, SaveDestination,
};
pub use output::{AssembledDocument, AssemblyOutcome, AssemblyStats, SectionSummary};
pub use process::{CommandOutput, CommandRunner, CommandSpec, OutputStream, TokioCommandRunner};
pub use progress::{AssemblyProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
