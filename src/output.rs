//! Result types returned by the assembly entry points.

use serde::Serialize;
use std::path::PathBuf;

/// One section of the assembled document, in final order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    /// Source fragment filename.
    pub filename: String,
    /// Heading text, or the filename-derived fallback.
    pub title: String,
    /// Priority rank; lower sorts earlier.
    pub rank: u32,
    /// Diagram blocks rasterised in this fragment.
    pub diagrams: usize,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub fragment_count: usize,
    pub diagram_count: usize,
    /// Wall-clock time spent in the external generator (0 when skipped).
    pub generator_duration_ms: u64,
    /// Wall-clock time spent rasterising diagrams.
    pub render_duration_ms: u64,
    /// Wall-clock time spent in the document converter.
    pub conversion_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Size of the saved document (0 until saved).
    pub output_bytes: u64,
}

/// The merged document, before conversion.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledDocument {
    /// Cover title derived from the repository reference.
    pub title: String,
    /// Project name the title was built from.
    pub project_name: String,
    /// Cover block plus every fragment in order.
    pub markdown: String,
    /// `markdown` rendered and wrapped in the styling envelope.
    pub html: String,
    pub sections: Vec<SectionSummary>,
    pub stats: AssemblyStats,
}

/// How a full pipeline run ended, when it did not fail.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssemblyOutcome {
    /// The document was written to `path`.
    Saved { path: PathBuf, stats: AssemblyStats },
    /// The user declined to choose a destination; nothing was written.
    UserCancelled { stats: AssemblyStats },
}

impl AssemblyOutcome {
    pub fn stats(&self) -> &AssemblyStats {
        match self {
            AssemblyOutcome::Saved { stats, .. } | AssemblyOutcome::UserCancelled { stats } => {
                stats
            }
        }
    }

    /// Destination path, or `None` when nothing was saved.
    pub fn saved_path(&self) -> Option<&PathBuf> {
        match self {
            AssemblyOutcome::Saved { path, .. } => Some(path),
            AssemblyOutcome::UserCancelled { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serialises_with_tag() {
        let saved = AssemblyOutcome::Saved {
            path: PathBuf::from("out.docx"),
            stats: AssemblyStats::default(),
        };
        let json = serde_json::to_value(&saved).unwrap();
        assert_eq!(json["outcome"], "saved");
        assert_eq!(json["path"], "out.docx");

        let cancelled = AssemblyOutcome::UserCancelled {
            stats: AssemblyStats::default(),
        };
        assert_eq!(serde_json::to_value(&cancelled).unwrap()["outcome"], "user_cancelled");
        assert!(cancelled.saved_path().is_none());
    }
}
