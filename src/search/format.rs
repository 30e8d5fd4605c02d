use std::collections::HashSet;

use crate::tavily::SearchHit;

/// Results kept per sub-question.
pub const MAX_HITS: usize = 6;
/// Characters of page content kept per result.
pub const SNIPPET_CHARS: usize = 250;

/// Renders hits as `Title: .. URL: .. Content: ..` blocks separated by blank lines.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .take(MAX_HITS)
        .map(|hit| {
            format!(
                "Title: {} URL: {} Content: {}...",
                hit.title,
                hit.url,
                truncate_chars(&hit.content, SNIPPET_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// First-seen unique, non-empty URLs, at most `cap`.
pub fn unique_sources<'a>(urls: impl IntoIterator<Item = &'a str>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| !url.is_empty() && seen.insert(*url))
        .take(cap)
        .map(str::to_string)
        .collect()
}
