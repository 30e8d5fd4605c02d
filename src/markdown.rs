use crate::pipeline::SearchOutcome;
use crate::pipeline::evaluate::MAX_SCORE;

/// Escape characters that break Markdown link syntax: `[`, `]`, `(`, `)`.
fn escape_md_link(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '[' | ']' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Collapses line breaks so text fits in one emphasis span.
fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Answer, then a Sources list and the evaluation summary.
pub(crate) fn render_outcome(outcome: &SearchOutcome) -> String {
    let mut output = outcome.answer.clone();

    if !outcome.sources.is_empty() {
        output.push_str("\n\n---\n**Sources:**\n");
        for url in &outcome.sources {
            let escaped = escape_md_link(url);
            output.push_str(&format!("- [{escaped}]({escaped})\n"));
        }
    }

    let summary = single_line(&outcome.evaluation.feedback);
    output.push_str(&format!(
        "\n_Quality score: {}/{MAX_SCORE}. {summary}_\n",
        outcome.evaluation.score
    ));
    output
}
