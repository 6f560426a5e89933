//! Upstream generator invocation.
//!
//! The generator is a black box: it gets the repository reference as its last
//! argument, writes one Markdown file per section into its output
//! directory, and reports success through its exit code. Its output is
//! streamed to the observer line by line while it runs.

use crate::config::{bounded, GeneratorSettings};
use crate::error::RepodocError;
use crate::process::{CommandRunner, CommandSpec};
use crate::progress::AssemblyProgressCallback;
use std::path::PathBuf;
use tracing::info;

/// The command that runs the generator for `repo_url`.
pub fn generator_command(settings: &GeneratorSettings, repo_url: &str) -> CommandSpec {
    CommandSpec::new(&settings.program)
        .args(settings.args.iter().cloned())
        .arg(repo_url)
        .current_dir(settings.working_dir.clone())
        .timeout(bounded(settings.timeout_secs))
}

/// Run the generator and return the directory it wrote fragments into.
///
/// # Errors
/// - [`RepodocError::GeneratorFailed`] on a non-zero exit
/// - [`RepodocError::MissingOutput`] if the output directory is absent afterwards
/// - spawn and timeout errors from the runner
pub async fn run_generator(
    settings: &GeneratorSettings,
    repo_url: &str,
    runner: &dyn CommandRunner,
    observer: &dyn AssemblyProgressCallback,
) -> Result<PathBuf, RepodocError> {
    let command = generator_command(settings, repo_url);
    info!("Running generator: {} {:?}", command.program, command.args);

    let output = runner.run(&command, observer).await?;
    if !output.success() {
        return Err(RepodocError::GeneratorFailed {
            program: command.program,
            status: output.status,
            diagnostics: output.diagnostics(),
        });
    }

    let dir = settings.resolved_output_dir();
    if !tokio::fs::metadata(&dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(RepodocError::MissingOutput {
            path: dir,
            detail: "generator exited successfully but wrote no output directory".to_string(),
        });
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use crate::progress::NoopProgressCallback;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Scripted {
        output: CommandOutput,
        create: Option<PathBuf>,
    }

    #[async_trait]
    impl CommandRunner for Scripted {
        async fn run(
            &self,
            _command: &CommandSpec,
            _observer: &dyn AssemblyProgressCallback,
        ) -> Result<CommandOutput, RepodocError> {
            if let Some(ref dir) = self.create {
                std::fs::create_dir_all(dir).unwrap();
            }
            Ok(self.output.clone())
        }
    }

    fn settings(wd: &TempDir) -> GeneratorSettings {
        GeneratorSettings {
            working_dir: Some(wd.path().to_path_buf()),
            ..GeneratorSettings::default()
        }
    }

    #[test]
    fn repo_url_is_last_argument() {
        let cmd = generator_command(&GeneratorSettings::default(), "https://github.com/psf/requests");
        assert_eq!(cmd.program, "python3");
        assert_eq!(
            cmd.args,
            vec!["app/run-pipeline.py", "--repo", "https://github.com/psf/requests"]
        );
        assert_eq!(cmd.timeout, Some(std::time::Duration::from_secs(1800)));
    }

    #[tokio::test]
    async fn success_returns_output_dir() {
        let wd = TempDir::new().unwrap();
        let s = settings(&wd);
        let runner = Scripted {
            output: CommandOutput::ok("Wrote: app/docs/overview.md\n"),
            create: Some(s.resolved_output_dir()),
        };
        let dir = run_generator(&s, "https://x/y/z", &runner, &NoopProgressCallback)
            .await
            .unwrap();
        assert_eq!(dir, wd.path().join("app/docs"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_generator_failure() {
        let wd = TempDir::new().unwrap();
        let s = settings(&wd);
        let runner = Scripted {
            output: CommandOutput::failed(1, "Traceback: git clone failed"),
            create: None,
        };
        let err = run_generator(&s, "https://x/y/z", &runner, &NoopProgressCallback)
            .await
            .unwrap_err();
        match err {
            RepodocError::GeneratorFailed { status, diagnostics, .. } => {
                assert_eq!(status, Some(1));
                assert!(diagnostics.contains("git clone failed"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_directory_after_success() {
        let wd = TempDir::new().unwrap();
        let s = settings(&wd);
        let runner = Scripted {
            output: CommandOutput::ok(""),
            create: None,
        };
        let err = run_generator(&s, "https://x/y/z", &runner, &NoopProgressCallback)
            .await
            .unwrap_err();
        assert!(matches!(err, RepodocError::MissingOutput { .. }), "got: {err}");
    }
}
