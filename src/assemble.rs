//! Pipeline orchestration entry points.
//!
//! [`run_pipeline`] drives a whole run: generator → fragments → document →
//! conversion → save. [`assemble_directory`] is the middle of it on its own,
//! for callers that already have a directory of fragments and want the
//! merged document without converting or saving it.

use crate::config::AssemblyConfig;
use crate::error::RepodocError;
use crate::export::{converter_for, persist, suggested_filename, DocumentConverter, SaveDestination};
use crate::output::{AssembledDocument, AssemblyOutcome, AssemblyStats, SectionSummary};
use crate::pipeline::{classify, diagram::DiagramRasterizer, fragments, generate, headers, merge};
use crate::process::{CommandRunner, TokioCommandRunner};
use crate::progress::{AssemblyProgressCallback, NoopProgressCallback, Stage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Merge the fragments in `dir` into one document titled after `repo_url`.
///
/// Fragments are processed one at a time in filename order: read,
/// normalised, rasterised, ranked. They are then ordered and merged.
///
/// # Errors
/// - [`RepodocError::MissingOutput`] / [`RepodocError::NoFragments`] if
///   `dir` is absent or holds no fragment files; nothing is merged
/// - [`RepodocError::FragmentReadFailed`] for an unreadable fragment
/// - [`RepodocError::RenderFailed`] for the first diagram that fails
pub async fn assemble_directory(
    dir: &Path,
    repo_url: &str,
    config: &AssemblyConfig,
) -> Result<AssembledDocument, RepodocError> {
    let start = Instant::now();
    let runner = resolve_runner(config);
    let observer = resolve_observer(config);

    // ── Step 1: Enumerate fragments ──────────────────────────────────────
    observer.on_stage(Stage::Collecting);
    let paths = fragments::discover_fragments(dir, &config.fragment_extension).await?;
    let total = paths.len();
    info!("Assembling {} fragments from {}", total, dir.display());

    // ── Step 2: Read, normalise, rasterise, rank ─────────────────────────
    observer.on_stage(Stage::Rendering);
    let rasterizer = DiagramRasterizer::new(runner.as_ref(), &config.renderer, observer)?;
    let render_start = Instant::now();
    let mut ranked = Vec::with_capacity(total);
    for (i, path) in paths.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        observer.on_fragment_start(&name, i + 1, total);

        let mut fragment = fragments::read_fragment(path).await?;
        fragment.content = headers::normalize_headers(&fragment.content);
        let rendered = rasterizer.rasterize(fragment).await?;
        let fragment = classify::rank_fragment(rendered);

        debug!(
            "{} → '{}' (rank {}, {} diagrams)",
            fragment.filename(),
            fragment.title(),
            fragment.rank(),
            fragment.diagrams()
        );
        observer.on_fragment_complete(fragment.filename(), fragment.rank(), fragment.diagrams());
        ranked.push(fragment);
    }
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Step 3: Order and merge ──────────────────────────────────────────
    observer.on_stage(Stage::Merging);
    classify::order_fragments(&mut ranked);
    let project_name = merge::project_name(repo_url, &config.default_project_name);
    let title = merge::cover_title(&project_name);
    let markdown = merge::merge_fragments(&title, &ranked, &config.section_separator);
    let html = merge::styled_html(&title, &markdown);

    let sections: Vec<SectionSummary> = ranked
        .iter()
        .map(|f| SectionSummary {
            filename: f.filename().to_string(),
            title: f.title().to_string(),
            rank: f.rank(),
            diagrams: f.diagrams(),
        })
        .collect();

    let stats = AssemblyStats {
        fragment_count: sections.len(),
        diagram_count: sections.iter().map(|s| s.diagrams).sum(),
        render_duration_ms,
        total_duration_ms: start.elapsed().as_millis() as u64,
        ..AssemblyStats::default()
    };
    info!(
        "Assembled '{}': {} sections, {} diagrams",
        title, stats.fragment_count, stats.diagram_count
    );

    Ok(AssembledDocument {
        title,
        project_name,
        markdown,
        html,
        sections,
        stats,
    })
}

/// Run the full pipeline for `repo_url`, converting with the converter that
/// matches `config.output_format`.
pub async fn run_pipeline(
    repo_url: &str,
    config: &AssemblyConfig,
    destination: &dyn SaveDestination,
) -> Result<AssemblyOutcome, RepodocError> {
    let converter = converter_for(
        config.output_format,
        resolve_runner(config),
        &config.converter,
        config.progress_callback.clone(),
    );
    run_pipeline_with(repo_url, config, converter.as_ref(), destination).await
}

/// Run the full pipeline with a caller-supplied converter.
///
/// Declining the save destination ends the run with
/// [`AssemblyOutcome::UserCancelled`]; nothing is written in that case.
///
/// # Errors
/// Every failure aborts the run; see [`RepodocError::category`] for the
/// taxonomy. No partial output file is ever left behind.
pub async fn run_pipeline_with(
    repo_url: &str,
    config: &AssemblyConfig,
    converter: &dyn DocumentConverter,
    destination: &dyn SaveDestination,
) -> Result<AssemblyOutcome, RepodocError> {
    let start = Instant::now();
    let observer = resolve_observer(config);
    info!("Starting documentation run for {}", repo_url);

    // ── Step 1: Generate ─────────────────────────────────────────────────
    let mut generator_duration_ms = 0;
    let docs_dir = if config.skip_generation {
        debug!("Generation skipped; using existing output");
        config.generator.resolved_output_dir()
    } else {
        observer.on_stage(Stage::Generating);
        let runner = resolve_runner(config);
        let gen_start = Instant::now();
        let dir = generate::run_generator(&config.generator, repo_url, runner.as_ref(), observer).await?;
        generator_duration_ms = gen_start.elapsed().as_millis() as u64;
        dir
    };

    // ── Step 2: Assemble ─────────────────────────────────────────────────
    let document = assemble_directory(&docs_dir, repo_url, config).await?;

    // ── Step 3: Convert ──────────────────────────────────────────────────
    observer.on_stage(Stage::Converting);
    let convert_start = Instant::now();
    let bytes = converter.convert(&document).await?;
    let conversion_duration_ms = convert_start.elapsed().as_millis() as u64;

    let mut stats = AssemblyStats {
        generator_duration_ms,
        conversion_duration_ms,
        ..document.stats
    };

    // ── Step 4: Save ─────────────────────────────────────────────────────
    observer.on_stage(Stage::Saving);
    let suggested = PathBuf::from(suggested_filename(&document.project_name, config.output_format));
    let outcome = match destination.choose(&suggested).await {
        Some(path) => {
            persist(&path, &bytes).await?;
            stats.output_bytes = bytes.len() as u64;
            stats.total_duration_ms = start.elapsed().as_millis() as u64;
            AssemblyOutcome::Saved { path, stats }
        }
        None => {
            info!("No destination chosen; document not saved");
            stats.total_duration_ms = start.elapsed().as_millis() as u64;
            AssemblyOutcome::UserCancelled { stats }
        }
    };

    observer.on_run_complete(outcome.stats());
    Ok(outcome)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The configured runner, or real subprocesses.
fn resolve_runner(config: &AssemblyConfig) -> Arc<dyn CommandRunner> {
    match config.runner {
        Some(ref runner) => Arc::clone(runner),
        None => Arc::new(TokioCommandRunner),
    }
}

fn resolve_observer(config: &AssemblyConfig) -> &dyn AssemblyProgressCallback {
    match config.progress_callback {
        Some(ref cb) => cb.as_ref(),
        None => &NoopProgressCallback,
    }
}
