//! Diagram rasterisation: fenced diagram blocks → inline images.
//!
//! Each ```` ```mermaid ```` block is written to its own temporary
//! directory, rendered by the external renderer to a fixed-width image on a
//! white background, read back, base64-inlined, and spliced into the text
//! where the block was. The temporary directory is a [`tempfile::TempDir`],
//! so it is removed when the render future finishes on any path: success,
//! renderer failure, timeout, or cancellation.
//!
//! Blocks share no state, so with `concurrency > 1` they are rendered
//! concurrently via `buffered`, which still yields results in block order.
//! Any failure aborts the whole fragment before a single substitution is
//! made.

use crate::config::{bounded, RendererSettings};
use crate::error::RepodocError;
use crate::pipeline::encode::encode_image;
use crate::pipeline::fragments::{Fragment, RenderedFragment};
use crate::process::{CommandRunner, CommandSpec};
use crate::progress::AssemblyProgressCallback;
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use std::ops::Range;
use tracing::debug;

/// One fenced diagram block found in a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    /// 1-indexed position within the fragment.
    pub index: usize,
    /// Byte range of the whole block, fences included.
    pub range: Range<usize>,
    /// Diagram description between the fences.
    pub source: String,
}

/// Compile the fence matcher for a diagram language tag.
///
/// The opening fence may be indented by any run of spaces or tabs (blocks
/// nested in list items are) and must carry exactly `language` as its info
/// string (ASCII case-insensitive); the block ends at the first closing
/// ```` ``` ```` after it.
pub fn fence_pattern(language: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?ms)^([ \t]*)```[ \t]*(?i:{})[ \t]*\r?\n(.*?)```",
        regex::escape(language.trim())
    ))
}

/// All non-overlapping diagram blocks in `text`, left to right.
///
/// A block's range starts at its opening fence, after the indent, so a
/// replacement keeps the enclosing list item's indentation. Its source has
/// the fence indent removed from every line.
pub fn scan_blocks(fence: &Regex, text: &str) -> Vec<DiagramBlock> {
    fence
        .captures_iter(text)
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let indent = caps.get(1).map_or(0, |m| m.len());
            Some(DiagramBlock {
                index: i + 1,
                range: whole.start() + indent..whole.end(),
                source: dedent(caps.get(2).map_or("", |m| m.as_str()), indent),
            })
        })
        .collect()
}

/// Strip up to `width` leading spaces or tabs from each line.
fn dedent(source: &str, width: usize) -> String {
    if width == 0 {
        return source.to_string();
    }
    source
        .split_inclusive('\n')
        .map(|line| {
            let strip = line
                .bytes()
                .take(width)
                .take_while(|b| *b == b' ' || *b == b'\t')
                .count();
            &line[strip..]
        })
        .collect()
}

/// Replace each block's range with the matching replacement, keeping all
/// text between blocks verbatim.
///
/// `blocks` must be in ascending, non-overlapping order and the same length
/// as `replacements`.
pub fn splice_blocks(text: &str, blocks: &[DiagramBlock], replacements: &[String]) -> String {
    debug_assert_eq!(blocks.len(), replacements.len());
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (block, replacement) in blocks.iter().zip(replacements) {
        out.push_str(&text[cursor..block.range.start]);
        out.push_str(replacement);
        cursor = block.range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Renders the diagram blocks of fragments through an external program.
pub struct DiagramRasterizer<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a RendererSettings,
    observer: &'a dyn AssemblyProgressCallback,
    fence: Regex,
}

impl<'a> DiagramRasterizer<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        settings: &'a RendererSettings,
        observer: &'a dyn AssemblyProgressCallback,
    ) -> Result<Self, RepodocError> {
        let fence = fence_pattern(&settings.fence_language).map_err(|e| {
            RepodocError::InvalidConfig(format!(
                "Bad diagram fence language '{}': {e}",
                settings.fence_language
            ))
        })?;
        Ok(Self {
            runner,
            settings,
            observer,
            fence,
        })
    }

    pub fn find_blocks(&self, text: &str) -> Vec<DiagramBlock> {
        scan_blocks(&self.fence, text)
    }

    /// Replace every diagram block of `fragment` with an inline image.
    ///
    /// # Errors
    /// [`RepodocError::RenderFailed`] on the first block that fails; no
    /// partially substituted text is returned.
    pub async fn rasterize(&self, fragment: Fragment) -> Result<RenderedFragment, RepodocError> {
        let blocks = self.find_blocks(&fragment.content);
        if blocks.is_empty() {
            return Ok(RenderedFragment {
                filename: fragment.filename,
                content: fragment.content,
                diagrams: 0,
            });
        }

        debug!(
            "Rendering {} diagram(s) in {}",
            blocks.len(),
            fragment.filename
        );
        let images: Vec<String> = stream::iter(
            blocks
                .iter()
                .map(|block| self.render_block(&fragment.filename, block)),
        )
        .buffered(self.settings.concurrency.max(1))
        .try_collect()
        .await?;

        Ok(RenderedFragment {
            content: splice_blocks(&fragment.content, &blocks, &images),
            diagrams: blocks.len(),
            filename: fragment.filename,
        })
    }

    /// Render one block and return the Markdown image element replacing it.
    async fn render_block(&self, fragment: &str, block: &DiagramBlock) -> Result<String, RepodocError> {
        let render_failed = |diagnostics: String| RepodocError::RenderFailed {
            fragment: fragment.to_string(),
            block: block.index,
            diagnostics,
        };

        let workdir = tempfile::Builder::new()
            .prefix("repodoc-diagram-")
            .tempdir()
            .map_err(|e| RepodocError::Internal(format!("tempdir: {e}")))?;
        let input = workdir.path().join("diagram.mmd");
        let output = workdir.path().join("diagram.png");

        tokio::fs::write(&input, &block.source)
            .await
            .map_err(|e| RepodocError::Internal(format!("writing diagram source: {e}")))?;

        let command = CommandSpec::new(&self.settings.program)
            .arg("-i")
            .arg(input.to_string_lossy())
            .arg("-o")
            .arg(output.to_string_lossy())
            .arg("-w")
            .arg(self.settings.width.to_string())
            .arg("-b")
            .arg(&self.settings.background)
            .args(self.settings.extra_args.iter().cloned())
            .timeout(bounded(self.settings.timeout_secs));

        let result = self.runner.run(&command, self.observer).await?;
        if !result.success() {
            return Err(render_failed(result.diagnostics()));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| render_failed(format!("renderer wrote no image ({e})")))?;
        let image = encode_image(&bytes)
            .ok_or_else(|| render_failed("renderer output is not a recognised image".to_string()))?;

        self.observer
            .on_diagram_rendered(fragment, block.index, bytes.len());
        Ok(image.markdown(&self.settings.alt_text))
    }
}
