//! Section classification and ordering.
//!
//! Generated sections arrive in whatever order the generator wrote them.
//! The assembled document always reads: objective/scope → installation →
//! technologies → architecture → API keys → everything else. The mapping is
//! a fixed rule table checked top to bottom, first match wins.

use crate::pipeline::fragments::{derive_title, RankedFragment, RenderedFragment};

/// Rank for titles that match no rule.
pub const DEFAULT_RANK: u32 = 999;

/// `(rank, keyword triggers)`, checked in order.
///
/// Triggers are lowercase substrings; `technolog` covers "technology",
/// "technologies" and "technological", `api key` covers "api keys".
pub const SECTION_RULES: &[(u32, &[&str])] = &[
    (0, &["objective", "scope", "overview"]),
    (1, &["installation", "setup", "getting started"]),
    (2, &["technolog", "tech stack", "dependencies"]),
    (3, &["system architecture", "architecture"]),
    (4, &["api key", "api access"]),
];

/// Rank a section title. Case-insensitive substring match; never fails.
pub fn classify(title: &str) -> u32 {
    let title = title.to_lowercase();
    SECTION_RULES
        .iter()
        .find(|(_, triggers)| triggers.iter().any(|t| title.contains(t)))
        .map_or(DEFAULT_RANK, |(rank, _)| *rank)
}

/// Attach title and rank to a rendered fragment.
pub fn rank_fragment(fragment: RenderedFragment) -> RankedFragment {
    let title = derive_title(&fragment.content, &fragment.filename);
    let rank = classify(&title);
    RankedFragment {
        filename: fragment.filename,
        title,
        rank,
        content: fragment.content,
        diagrams: fragment.diagrams,
    }
}

/// Sort by `(rank, filename)`; deterministic for unique filenames.
pub fn order_fragments(fragments: &mut [RankedFragment]) {
    fragments.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.filename.cmp(&b.filename)));
}
