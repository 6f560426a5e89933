//! Final conversion and saving.
//!
//! Two collaborators sit at the end of the pipeline and both are traits:
//!
//! * [`DocumentConverter`] turns the assembled document into the bytes of the
//!   target format. [`PandocConverter`] shells out to pandoc for `.docx`;
//!   [`PassthroughConverter`] emits the HTML or Markdown directly.
//!
//! pandoc's HTML reader discards `<style>` and inline CSS, so `.docx` output
//! keeps headings, lists, tables, code, images and the cover title but not
//! the stylesheet or forced page breaks. Styling for Word comes from
//! [`ConverterSettings::reference_doc`] instead.
//! * [`SaveDestination`] asks where to put the result. Returning `None` means
//!   the user declined, which is a normal, non-error ending.
//!
//! [`persist`] writes atomically (temp sibling + rename) so a failed write
//! never leaves a truncated document at the destination.

use crate::config::{bounded, ConverterSettings, OutputFormat};
use crate::error::RepodocError;
use crate::output::AssembledDocument;
use crate::process::{CommandRunner, CommandSpec};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Converts an assembled document into the bytes of the output file.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, document: &AssembledDocument) -> Result<Vec<u8>, RepodocError>;
}

/// `.docx` conversion through pandoc, reading the styled HTML.
pub struct PandocConverter {
    runner: Arc<dyn CommandRunner>,
    settings: ConverterSettings,
    observer: Option<ProgressCallback>,
}

impl PandocConverter {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: ConverterSettings) -> Self {
        Self {
            runner,
            settings,
            observer: None,
        }
    }

    /// Forward pandoc's output lines to `observer`.
    pub fn with_observer(mut self, observer: Option<ProgressCallback>) -> Self {
        self.observer = observer;
        self
    }
}

#[async_trait]
impl DocumentConverter for PandocConverter {
    async fn convert(&self, document: &AssembledDocument) -> Result<Vec<u8>, RepodocError> {
        let failed = |detail: String| RepodocError::ConversionFailed { detail };

        let workdir = tempfile::Builder::new()
            .prefix("repodoc-convert-")
            .tempdir()
            .map_err(|e| failed(format!("tempdir: {e}")))?;
        let input = workdir.path().join("document.html");
        let output = workdir.path().join("document.docx");
        tokio::fs::write(&input, &document.html)
            .await
            .map_err(|e| failed(format!("writing HTML: {e}")))?;

        let command = CommandSpec::new(&self.settings.program)
            .arg(input.to_string_lossy())
            .args(["-f", "html", "-t", "docx", "-o"])
            .arg(output.to_string_lossy())
            .args(self.settings.reference_doc.iter().flat_map(|doc| {
                ["--reference-doc".to_string(), doc.to_string_lossy().into_owned()]
            }))
            .timeout(bounded(self.settings.timeout_secs));
        debug!("Converting with {}", command.program);

        let result = match self.observer {
            Some(ref observer) => self.runner.run(&command, observer.as_ref()).await?,
            None => self.runner.run(&command, &NoopProgressCallback).await?,
        };
        if !result.success() {
            return Err(failed(format!(
                "{} exited with {:?}: {}",
                self.settings.program,
                result.status,
                result.diagnostics()
            )));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| failed(format!("{} wrote no document ({e})", self.settings.program)))?;
        if bytes.is_empty() {
            return Err(failed(format!("{} wrote an empty document", self.settings.program)));
        }
        Ok(bytes)
    }
}

/// Emits the styled HTML or the merged Markdown unchanged.
#[derive(Debug, Clone, Copy)]
pub struct PassthroughConverter(pub OutputFormat);

#[async_trait]
impl DocumentConverter for PassthroughConverter {
    async fn convert(&self, document: &AssembledDocument) -> Result<Vec<u8>, RepodocError> {
        match self.0 {
            OutputFormat::Html => Ok(document.html.clone().into_bytes()),
            OutputFormat::Markdown => Ok(document.markdown.clone().into_bytes()),
            OutputFormat::Docx => Err(RepodocError::ConversionFailed {
                detail: "docx output needs an external converter".to_string(),
            }),
        }
    }
}

/// The converter matching `format`.
pub fn converter_for(
    format: OutputFormat,
    runner: Arc<dyn CommandRunner>,
    settings: &ConverterSettings,
    observer: Option<ProgressCallback>,
) -> Box<dyn DocumentConverter> {
    match format {
        OutputFormat::Docx => {
            Box::new(PandocConverter::new(runner, settings.clone()).with_observer(observer))
        }
        other => Box::new(PassthroughConverter(other)),
    }
}

/// Chooses where the document is saved.
#[async_trait]
pub trait SaveDestination: Send + Sync {
    /// Return the destination, or `None` if the user declined.
    async fn choose(&self, suggested: &Path) -> Option<PathBuf>;
}

/// Always saves to the same path.
#[derive(Debug, Clone)]
pub struct FixedDestination(pub PathBuf);

#[async_trait]
impl SaveDestination for FixedDestination {
    async fn choose(&self, _suggested: &Path) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Always declines; the run ends as cancelled after assembling.
#[derive(Debug, Clone, Copy)]
pub struct DeclineDestination;

#[async_trait]
impl SaveDestination for DeclineDestination {
    async fn choose(&self, _suggested: &Path) -> Option<PathBuf> {
        None
    }
}

/// `<project>_documentation.<ext>`, with path-hostile characters replaced.
pub fn suggested_filename(project: &str, format: OutputFormat) -> String {
    let safe: String = project
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_documentation.{}", safe.trim_matches('.'), format.extension())
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub async fn persist(path: &Path, bytes: &[u8]) -> Result<(), RepodocError> {
    let write_failed = |source: std::io::Error| RepodocError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| write_failed(std::io::Error::other("destination has no file name")))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::AssemblyStats;
    use crate::process::CommandOutput;
    use crate::progress::AssemblyProgressCallback;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn document() -> AssembledDocument {
        AssembledDocument {
            title: "demo Documentation".into(),
            project_name: "demo".into(),
            markdown: "# Overview\n".into(),
            html: "<!DOCTYPE html><html><body><h1>Overview</h1></body></html>".into(),
            sections: Vec::new(),
            stats: AssemblyStats::default(),
        }
    }

    struct FakePandoc {
        exit: i32,
        seen_html: Mutex<Option<String>>,
    }

    #[async_trait]
    impl CommandRunner for FakePandoc {
        async fn run(
            &self,
            command: &CommandSpec,
            _observer: &dyn AssemblyProgressCallback,
        ) -> Result<CommandOutput, RepodocError> {
            let html = std::fs::read_to_string(&command.args[0]).unwrap();
            *self.seen_html.lock().unwrap() = Some(html);
            if self.exit != 0 {
                return Ok(CommandOutput::failed(self.exit, "pandoc: unknown reader"));
            }
            let out = command.arg_after("-o").unwrap();
            std::fs::write(out, b"PK\x03\x04docx").unwrap();
            Ok(CommandOutput::ok(""))
        }
    }

    #[tokio::test]
    async fn pandoc_converts_styled_html() {
        let runner = Arc::new(FakePandoc { exit: 0, seen_html: Mutex::new(None) });
        let converter = PandocConverter::new(runner.clone(), ConverterSettings::default());
        let bytes = converter.convert(&document()).await.unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert_eq!(
            runner.seen_html.lock().unwrap().as_deref(),
            Some(document().html.as_str())
        );
    }

    #[derive(Default)]
    struct ArgLog(Mutex<Vec<CommandSpec>>);

    #[async_trait]
    impl CommandRunner for ArgLog {
        async fn run(
            &self,
            command: &CommandSpec,
            _observer: &dyn AssemblyProgressCallback,
        ) -> Result<CommandOutput, RepodocError> {
            self.0.lock().unwrap().push(command.clone());
            std::fs::write(command.arg_after("-o").unwrap(), b"PK\x03\x04docx").unwrap();
            Ok(CommandOutput::ok(""))
        }
    }

    #[tokio::test]
    async fn reference_doc_is_passed_to_pandoc_only_when_set() {
        let runner = Arc::new(ArgLog::default());
        PandocConverter::new(runner.clone(), ConverterSettings::default())
            .convert(&document())
            .await
            .unwrap();
        let settings = ConverterSettings {
            reference_doc: Some(PathBuf::from("styles/house.docx")),
            ..ConverterSettings::default()
        };
        PandocConverter::new(runner.clone(), settings)
            .convert(&document())
            .await
            .unwrap();

        let commands = runner.0.lock().unwrap();
        assert_eq!(commands[0].arg_after("--reference-doc"), None);
        assert_eq!(commands[1].arg_after("--reference-doc"), Some("styles/house.docx"));
        assert_eq!(commands[1].arg_after("-t"), Some("docx"));
    }

    #[tokio::test]
    async fn pandoc_failure_is_conversion_failure() {
        let runner = Arc::new(FakePandoc { exit: 64, seen_html: Mutex::new(None) });
        let converter = PandocConverter::new(runner, ConverterSettings::default());
        let err = converter.convert(&document()).await.unwrap_err();
        assert!(matches!(err, RepodocError::ConversionFailed { .. }));
        assert!(err.to_string().contains("unknown reader"));
    }

    #[tokio::test]
    async fn passthrough_emits_requested_text() {
        let doc = document();
        let html = PassthroughConverter(OutputFormat::Html).convert(&doc).await.unwrap();
        assert_eq!(html, doc.html.as_bytes());
        let md = PassthroughConverter(OutputFormat::Markdown).convert(&doc).await.unwrap();
        assert_eq!(md, b"# Overview\n");
    }

    #[test]
    fn suggested_names_are_path_safe() {
        assert_eq!(suggested_filename("myrepo", OutputFormat::Docx), "myrepo_documentation.docx");
        assert_eq!(
            suggested_filename("my repo/x", OutputFormat::Html),
            "my_repo_x_documentation.html"
        );
    }

    #[tokio::test]
    async fn persist_creates_parents_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/nested/doc.docx");
        persist(&path, b"bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn persist_into_file_parent_is_write_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = persist(&blocker.join("doc.docx"), b"bytes").await.unwrap_err();
        assert!(matches!(err, RepodocError::OutputWriteFailed { .. }));
    }

    #[tokio::test]
    async fn destinations() {
        let fixed = FixedDestination(PathBuf::from("a.docx"));
        assert_eq!(fixed.choose(Path::new("b.docx")).await, Some(PathBuf::from("a.docx")));
        assert_eq!(DeclineDestination.choose(Path::new("b.docx")).await, None);
    }
}
