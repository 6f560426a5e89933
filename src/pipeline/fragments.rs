//! Fragment discovery and loading.
//!
//! A fragment is one generated Markdown file, identified by its filename.
//! Its content moves through three types so the compiler enforces the stage
//! order: [`Fragment`] (as read and normalised) → [`RenderedFragment`]
//! (diagrams replaced, only [`crate::pipeline::diagram`] builds these) →
//! [`RankedFragment`] (title and rank attached, ready to merge).

use crate::error::RepodocError;
use crate::pipeline::headers::{normalise_line_endings, top_level_heading};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A fragment as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Source filename; unique within one run.
    pub filename: String,
    pub content: String,
}

impl Fragment {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// A fragment whose diagram blocks have all been replaced by images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFragment {
    pub(crate) filename: String,
    pub(crate) content: String,
    pub(crate) diagrams: usize,
}

impl RenderedFragment {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of diagram blocks that were rasterised.
    pub fn diagrams(&self) -> usize {
        self.diagrams
    }
}

/// A rendered fragment with its title and priority rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedFragment {
    pub(crate) filename: String,
    pub(crate) title: String,
    pub(crate) rank: u32,
    pub(crate) content: String,
    pub(crate) diagrams: usize,
}

impl RankedFragment {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn diagrams(&self) -> usize {
        self.diagrams
    }
}

/// The fragment's title: the first top-level heading outside fenced code,
/// else a name derived from the filename.
pub fn derive_title(content: &str, filename: &str) -> String {
    let mut fence: Option<&str> = None;
    let heading = content.lines().find_map(|line| {
        let marker = ["```", "~~~"]
            .into_iter()
            .find(|m| line.trim_start().starts_with(m));
        match (fence, marker) {
            (None, Some(m)) => fence = Some(m),
            (Some(open), Some(m)) if open == m => fence = None,
            (Some(_), _) => {}
            (None, None) => return top_level_heading(line),
        }
        None
    });
    match heading {
        Some(title) => title.to_string(),
        None => {
            warn!("Fragment '{}' has no top-level heading", filename);
            title_from_filename(filename)
        }
    }
}

/// `installation_setup.md` → `installation setup`.
pub fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    stem.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// List fragment files in `dir`, sorted by filename.
///
/// Only regular files directly inside `dir` whose extension equals
/// `extension` (ignoring ASCII case) are returned.
///
/// # Errors
/// - [`RepodocError::MissingOutput`] if `dir` does not exist or is not a directory
/// - [`RepodocError::NoFragments`] if no file matches
pub async fn discover_fragments(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, RepodocError> {
    let missing = |detail: String| RepodocError::MissingOutput {
        path: dir.to_path_buf(),
        detail,
    };

    let meta = tokio::fs::metadata(dir)
        .await
        .map_err(|e| missing(format!("output directory not found ({e})")))?;
    if !meta.is_dir() {
        return Err(missing("not a directory".to_string()));
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| missing(format!("cannot list directory ({e})")))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| missing(format!("cannot list directory ({e})")))?
    {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(RepodocError::NoFragments {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} fragments in {}", paths.len(), dir.display());
    Ok(paths)
}

/// Read one fragment file as UTF-8, normalising line endings.
pub async fn read_fragment(path: &Path) -> Result<Fragment, RepodocError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RepodocError::FragmentReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Fragment::new(filename, normalise_line_endings(&content)))
}
