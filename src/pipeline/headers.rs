//! Header normalisation: drop a top-level title the generator repeated.
//!
//! Section writers often emit `# Installation & Setup` themselves and then the
//! wrapping template adds the same heading again, so a fragment can open
//! with the title twice. [`normalize_headers`] removes the repeat. It only
//! looks at the first two non-blank lines and never touches anything else,
//! which keeps it idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_TOP_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ ]{0,3}#[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").unwrap());

/// Text of a level-1 ATX heading line, or `None`.
///
/// `## Sub` is not a top-level heading; `#Tight` is not a heading at all.
pub fn top_level_heading(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\n', '\r']);
    RE_TOP_HEADING
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
}

/// Convert CRLF and lone CR line endings to LF.
pub fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Remove a duplicated leading top-level heading.
///
/// If the first non-blank line is `# T` and the next non-blank line is also a
/// top-level heading whose text equals `T` (case-insensitive, trimmed), the
/// repeat is removed together with the blank lines between the two and one
/// blank line after it. A run of several repeats collapses to one, so
/// `normalize_headers(normalize_headers(x)) == normalize_headers(x)`.
///
/// A leading byte-order mark is stripped. Text without a leading heading is
/// returned unchanged.
pub fn normalize_headers(input: &str) -> String {
    let text = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let is_blank = |i: usize| lines[i].trim().is_empty();

    let Some(first) = (0..lines.len()).find(|&i| !is_blank(i)) else {
        return text.to_string();
    };
    let Some(title) = top_level_heading(lines[first]) else {
        return text.to_string();
    };
    let title = title.to_lowercase();

    let mut resume = first + 1;
    loop {
        let Some(next) = (resume..lines.len()).find(|&i| !is_blank(i)) else {
            break;
        };
        match top_level_heading(lines[next]) {
            Some(t) if t.to_lowercase() == title => {
                resume = next + 1;
                if resume < lines.len() && is_blank(resume) {
                    resume += 1;
                }
            }
            _ => break,
        }
    }

    if resume == first + 1 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for line in &lines[..=first] {
        out.push_str(line);
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    for line in &lines[resume..] {
        out.push_str(line);
    }
    out
}
