//! Document merging: cover block, ordered sections, styling envelope.
//!
//! The merged Markdown starts with a centred cover title and a forced page
//! break, followed by every ranked fragment in order. For conversion it is
//! rendered to HTML with `pulldown-cmark` and wrapped in a small stylesheet.
//! The stylesheet and the page breaks shape HTML output only; pandoc keeps
//! the document structure when writing `.docx` and drops both.

use crate::config::SectionSeparator;
use crate::pipeline::fragments::RankedFragment;
use pulldown_cmark::{html, Options, Parser};
use url::Url;

/// Stylesheet embedded in every generated document.
pub const DOCUMENT_STYLE: &str = "\
body { font-family: Calibri, Arial, sans-serif; font-size: 11pt; line-height: 1.4; }
h1, h2, h3, h4 { font-family: Calibri, Arial, sans-serif; margin-top: 18pt; margin-bottom: 6pt; }
h1 { font-size: 20pt; }
h2 { font-size: 16pt; }
h3 { font-size: 13pt; }
pre, code { font-family: Consolas, 'Courier New', monospace; font-size: 9.5pt; }
pre { background: #f4f4f4; border: 1px solid #dddddd; padding: 6pt; white-space: pre-wrap; }
table { border-collapse: collapse; width: 100%; margin: 6pt 0; }
th, td { border: 1px solid #999999; padding: 4pt 6pt; vertical-align: top; }
th { background: #eeeeee; }
img { max-width: 100%; height: auto; }
.cover { text-align: center; margin-top: 200pt; }
";

const PAGE_BREAK: &str = "<div style=\"page-break-after: always;\"></div>";

/// Human-readable project name from a repository reference.
///
/// The last non-empty path segment of the URL with a trailing `.git`
/// removed: `https://host/owner/myrepo.git` → `myrepo`. Returns `None` when
/// the reference is not a URL or has no usable segment.
pub fn repo_name(reference: &str) -> Option<String> {
    let url = Url::parse(reference.trim()).ok()?;
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    (!name.is_empty()).then(|| name.to_string())
}

/// [`repo_name`] with a fallback; never fails.
pub fn project_name(reference: &str, default: &str) -> String {
    repo_name(reference).unwrap_or_else(|| default.to_string())
}

/// The cover title shown on the first page.
pub fn cover_title(project: &str) -> String {
    format!("{project} Documentation")
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cover block: centred title then a forced page break.
pub fn cover_block(title: &str) -> String {
    format!(
        "<div class=\"cover\">\n<h1>{}</h1>\n</div>\n\n{}\n",
        escape_html(title),
        PAGE_BREAK
    )
}

/// Concatenate the cover and the ordered fragments into one Markdown stream.
///
/// An empty `fragments` slice yields a cover-only document.
pub fn merge_fragments(
    title: &str,
    fragments: &[RankedFragment],
    separator: &SectionSeparator,
) -> String {
    let mut parts = vec![cover_block(title)];
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            parts.push(separator.render().to_string());
        } else {
            parts.push("\n".to_string());
        }
        parts.push(fragment.content.trim_matches('\n').to_string());
    }
    let mut merged = parts.join("");
    if !merged.ends_with('\n') {
        merged.push('\n');
    }
    merged
}

/// Render Markdown to an HTML body fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() + markdown.len() / 4);
    html::push_html(&mut body, parser);
    body
}

/// Wrap merged Markdown in the HTML styling envelope.
pub fn styled_html(title: &str, markdown: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        DOCUMENT_STYLE,
        markdown_to_html(markdown)
    )
}
