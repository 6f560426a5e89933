//! Configuration types for documentation assembly.
//!
//! All assembly behaviour is controlled through [`AssemblyConfig`], built via
//! its [`AssemblyConfigBuilder`]. The external programs (generator, diagram
//! renderer, document converter) each get their own settings struct so a
//! caller can swap one tool without touching the others.

use crate::error::RepodocError;
use crate::process::CommandRunner;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How to invoke the upstream documentation generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Executable to run. Default: `python3`.
    pub program: String,

    /// Arguments placed before the repository reference, which is always
    /// appended last. Default: `["app/run-pipeline.py", "--repo"]`.
    pub args: Vec<String>,

    /// Working directory for the generator. `None` inherits ours.
    pub working_dir: Option<PathBuf>,

    /// Directory the generator writes fragments into, relative to
    /// `working_dir` unless absolute. Default: `app/docs`.
    pub output_dir: PathBuf,

    /// Upper bound on generator run time in seconds; 0 disables. Default: 1800.
    ///
    /// Cloning, embedding and five LLM-written sections routinely take
    /// several minutes, so the bound is generous.
    pub timeout_secs: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["app/run-pipeline.py".to_string(), "--repo".to_string()],
            working_dir: None,
            output_dir: PathBuf::from("app/docs"),
            timeout_secs: 1800,
        }
    }
}

impl GeneratorSettings {
    /// The fragment directory, resolved against `working_dir`.
    pub fn resolved_output_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(wd) if self.output_dir.is_relative() => wd.join(&self.output_dir),
            _ => self.output_dir.clone(),
        }
    }
}

/// How to rasterise fenced diagram blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Renderer executable. Default: `mmdc` (mermaid-cli).
    pub program: String,

    /// Info-string tag that marks a fenced block as a diagram. Default: `mermaid`.
    pub fence_language: String,

    /// Output image width in pixels. Default: 1200.
    pub width: u32,

    /// Background colour passed to the renderer. Default: `white`.
    pub background: String,

    /// Extra arguments appended after the standard ones.
    pub extra_args: Vec<String>,

    /// Accessible text on the substituted image element. Default: `Diagram`.
    pub alt_text: String,

    /// Per-diagram time limit in seconds; 0 disables. Default: 120.
    pub timeout_secs: u64,

    /// Diagram blocks of one fragment rendered at once. Default: 1.
    ///
    /// Substitution order is preserved at any value.
    pub concurrency: usize,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            program: "mmdc".to_string(),
            fence_language: "mermaid".to_string(),
            width: 1200,
            background: "white".to_string(),
            extra_args: Vec::new(),
            alt_text: "Diagram".to_string(),
            timeout_secs: 120,
            concurrency: 1,
        }
    }
}

/// How to convert the styled HTML into the final binary document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterSettings {
    /// Converter executable. Default: `pandoc`.
    pub program: String,

    /// Time limit in seconds; 0 disables. Default: 300.
    pub timeout_secs: u64,

    /// Word document whose styles the converter copies (`--reference-doc`).
    /// The HTML stylesheet does not reach `.docx` output; this does.
    pub reference_doc: Option<PathBuf>,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
            timeout_secs: 300,
            reference_doc: None,
        }
    }
}

/// Turn a seconds setting into an optional bound (0 means unbounded).
pub(crate) fn bounded(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Configuration for one assembly run.
///
/// Built via [`AssemblyConfig::builder()`] or using
/// [`AssemblyConfig::default()`].
///
/// # Example
/// ```rust
/// use repodoc::{AssemblyConfig, OutputFormat};
///
/// let config = AssemblyConfig::builder()
///     .diagram_width(1600)
///     .output_format(OutputFormat::Html)
///     .skip_generation(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AssemblyConfig {
    pub generator: GeneratorSettings,
    pub renderer: RendererSettings,
    pub converter: ConverterSettings,

    /// Fragment file extension, without the dot. Default: `md`.
    pub fragment_extension: String,

    /// Separator placed between merged fragments. Default: blank line.
    pub section_separator: SectionSeparator,

    /// Target document format. Default: [`OutputFormat::Docx`].
    pub output_format: OutputFormat,

    /// Name used when the repository reference yields none. Default: `Project`.
    pub default_project_name: String,

    /// Assemble an existing output directory instead of running the generator.
    pub skip_generation: bool,

    /// Observer for stage events and the live subprocess log feed.
    pub progress_callback: Option<ProgressCallback>,

    /// Process launcher. `None` uses [`crate::process::TokioCommandRunner`].
    pub runner: Option<Arc<dyn CommandRunner>>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorSettings::default(),
            renderer: RendererSettings::default(),
            converter: ConverterSettings::default(),
            fragment_extension: "md".to_string(),
            section_separator: SectionSeparator::default(),
            output_format: OutputFormat::default(),
            default_project_name: "Project".to_string(),
            skip_generation: false,
            progress_callback: None,
            runner: None,
        }
    }
}

impl fmt::Debug for AssemblyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyConfig")
            .field("generator", &self.generator)
            .field("renderer", &self.renderer)
            .field("converter", &self.converter)
            .field("fragment_extension", &self.fragment_extension)
            .field("section_separator", &self.section_separator)
            .field("output_format", &self.output_format)
            .field("default_project_name", &self.default_project_name)
            .field("skip_generation", &self.skip_generation)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AssemblyProgressCallback>"),
            )
            .field("runner", &self.runner.as_ref().map(|_| "<dyn CommandRunner>"))
            .finish()
    }
}

impl AssemblyConfig {
    /// Create a new builder for `AssemblyConfig`.
    pub fn builder() -> AssemblyConfigBuilder {
        AssemblyConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AssemblyConfig`].
pub struct AssemblyConfigBuilder {
    config: AssemblyConfig,
}

impl AssemblyConfigBuilder {
    pub fn generator_program(mut self, program: impl Into<String>) -> Self {
        self.config.generator.program = program.into();
        self
    }

    pub fn generator_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.generator.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.generator.working_dir = Some(dir.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.generator.output_dir = dir.into();
        self
    }

    pub fn generator_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generator.timeout_secs = secs;
        self
    }

    pub fn renderer_program(mut self, program: impl Into<String>) -> Self {
        self.config.renderer.program = program.into();
        self
    }

    pub fn fence_language(mut self, lang: impl Into<String>) -> Self {
        self.config.renderer.fence_language = lang.into();
        self
    }

    pub fn diagram_width(mut self, px: u32) -> Self {
        self.config.renderer.width = px;
        self
    }

    pub fn diagram_background(mut self, colour: impl Into<String>) -> Self {
        self.config.renderer.background = colour.into();
        self
    }

    pub fn renderer_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.renderer.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.renderer.timeout_secs = secs;
        self
    }

    pub fn render_concurrency(mut self, n: usize) -> Self {
        self.config.renderer.concurrency = n.max(1);
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter.program = program.into();
        self
    }

    pub fn converter_timeout_secs(mut self, secs: u64) -> Self {
        self.config.converter.timeout_secs = secs;
        self
    }

    /// Style `.docx` output after this Word document.
    pub fn reference_doc(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.converter.reference_doc = Some(path.into());
        self
    }

    pub fn fragment_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.fragment_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn section_separator(mut self, sep: SectionSeparator) -> Self {
        self.config.section_separator = sep;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn default_project_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_project_name = name.into();
        self
    }

    pub fn skip_generation(mut self, v: bool) -> Self {
        self.config.skip_generation = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.config.runner = Some(runner);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssemblyConfig, RepodocError> {
        let c = &self.config;
        if c.renderer.width == 0 {
            return Err(RepodocError::InvalidConfig(
                "Diagram width must be ≥ 1 pixel".into(),
            ));
        }
        if c.renderer.fence_language.trim().is_empty() {
            return Err(RepodocError::InvalidConfig(
                "Diagram fence language must not be empty".into(),
            ));
        }
        if c.fragment_extension.is_empty() {
            return Err(RepodocError::InvalidConfig(
                "Fragment extension must not be empty".into(),
            ));
        }
        if c.default_project_name.trim().is_empty() {
            return Err(RepodocError::InvalidConfig(
                "Default project name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Format of the saved document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Word document produced by the external converter. (default)
    #[default]
    Docx,
    /// The styled HTML envelope itself; no converter needed.
    Html,
    /// The merged Markdown stream; no converter needed.
    Markdown,
}

impl OutputFormat {
    /// File extension for this format, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
        }
    }
}

/// How to separate fragments in the merged Markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionSeparator {
    /// A single blank line. (default)
    #[default]
    BlankLine,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// Forced page break so every section starts on a new page. Only HTML
    /// output honours it; the `.docx` converter drops it.
    PageBreak,
}

impl SectionSeparator {
    /// Render the separator string placed between two fragments.
    pub fn render(&self) -> &'static str {
        match self {
            SectionSeparator::BlankLine => "\n\n",
            SectionSeparator::HorizontalRule => "\n\n---\n\n",
            SectionSeparator::PageBreak => "\n\n<div style=\"page-break-after: always;\"></div>\n\n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_tools() {
        let c = AssemblyConfig::default();
        assert_eq!(c.renderer.program, "mmdc");
        assert_eq!(c.renderer.width, 1200);
        assert_eq!(c.renderer.background, "white");
        assert_eq!(c.generator.output_dir, PathBuf::from("app/docs"));
        assert_eq!(c.fragment_extension, "md");
        assert_eq!(c.output_format, OutputFormat::Docx);
    }

    #[test]
    fn builder_rejects_zero_width() {
        let err = AssemblyConfig::builder().diagram_width(0).build().unwrap_err();
        assert!(matches!(err, RepodocError::InvalidConfig(_)));
    }

    #[test]
    fn builder_strips_leading_dot_from_extension() {
        let c = AssemblyConfig::builder()
            .fragment_extension(".markdown")
            .build()
            .unwrap();
        assert_eq!(c.fragment_extension, "markdown");
    }

    #[test]
    fn render_concurrency_floor_is_one() {
        let c = AssemblyConfig::builder().render_concurrency(0).build().unwrap();
        assert_eq!(c.renderer.concurrency, 1);
    }

    #[test]
    fn output_dir_resolves_against_working_dir() {
        let c = AssemblyConfig::builder()
            .working_dir("/srv/gen")
            .build()
            .unwrap();
        assert_eq!(
            c.generator.resolved_output_dir(),
            PathBuf::from("/srv/gen/app/docs")
        );

        let abs = AssemblyConfig::builder()
            .working_dir("/srv/gen")
            .output_dir("/tmp/docs")
            .build()
            .unwrap();
        assert_eq!(abs.generator.resolved_output_dir(), PathBuf::from("/tmp/docs"));
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        assert_eq!(bounded(0), None);
        assert_eq!(bounded(5), Some(Duration::from_secs(5)));
    }

    #[test]
    fn separators_render() {
        assert_eq!(SectionSeparator::BlankLine.render(), "\n\n");
        assert!(SectionSeparator::PageBreak.render().contains("page-break-after"));
    }
}
