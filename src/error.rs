//! Error types for the repodoc library.
//!
//! Every failure in the assembly pipeline is fatal: the run aborts and the
//! user re-runs after fixing the cause. There is no partial-success type;
//! a document with one unrendered diagram is never emitted.
//!
//! [`RepodocError::category`] folds the variants onto the five failure
//! classes callers branch on (subprocess, missing output, render,
//! conversion, write) plus configuration and internal errors.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the repodoc library.
#[derive(Debug, Error)]
pub enum RepodocError {
    // ── Subprocess errors ─────────────────────────────────────────────────
    /// The documentation generator exited with a non-zero status.
    #[error("Generator '{program}' failed ({}):\n{diagnostics}", exit_label(*.status))]
    GeneratorFailed {
        program: String,
        status: Option<i32>,
        diagnostics: String,
    },

    /// An external program could not be started at all.
    #[error("Failed to start '{program}': {source}\nIs it installed and on PATH?")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program exceeded its configured time limit and was killed.
    #[error("'{program}' did not finish within {secs}s and was killed")]
    SubprocessTimedOut { program: String, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The generator reported success but its output is not where expected.
    #[error("Expected output missing at '{path}': {detail}")]
    MissingOutput { path: PathBuf, detail: String },

    /// The output directory exists but holds no fragment files.
    #[error("No '*.{extension}' fragments found in '{dir}'")]
    NoFragments { dir: PathBuf, extension: String },

    /// A fragment file exists but could not be read as UTF-8 text.
    #[error("Failed to read fragment '{path}': {source}")]
    FragmentReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Render errors ─────────────────────────────────────────────────────
    /// A diagram block could not be rasterised.
    #[error("Diagram {block} in '{fragment}' failed to render:\n{diagnostics}")]
    RenderFailed {
        fragment: String,
        block: usize,
        diagnostics: String,
    },

    // ── Conversion / write errors ─────────────────────────────────────────
    /// The final document conversion failed.
    #[error("Document conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure class of a [`RepodocError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Subprocess,
    MissingOutput,
    Render,
    Conversion,
    Write,
    Config,
    Internal,
}

impl RepodocError {
    /// The failure class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RepodocError::GeneratorFailed { .. }
            | RepodocError::SpawnFailed { .. }
            | RepodocError::SubprocessTimedOut { .. } => ErrorCategory::Subprocess,
            RepodocError::MissingOutput { .. }
            | RepodocError::NoFragments { .. }
            | RepodocError::FragmentReadFailed { .. } => ErrorCategory::MissingOutput,
            RepodocError::RenderFailed { .. } => ErrorCategory::Render,
            RepodocError::ConversionFailed { .. } => ErrorCategory::Conversion,
            RepodocError::OutputWriteFailed { .. } => ErrorCategory::Write,
            RepodocError::InvalidConfig(_) => ErrorCategory::Config,
            RepodocError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

fn exit_label(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
