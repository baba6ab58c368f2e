//! Markdown rendering of a research run.

use crate::extract::PageRecord;
use chrono::{DateTime, Utc};

const HEADER: &str = "| # | Title | URL | Summary | Key Facts | Published |\n|---|-------|-----|---------|-----------|-----------|";

fn cell(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        "-".to_string()
    } else {
        flat.replace('|', "\\|")
    }
}

pub fn render(
    query: &str,
    records: &[PageRecord],
    trends: &str,
    generated: DateTime<Utc>,
) -> String {
    let mut out = format!(
        "# Research: {}\n\n_Generated {}_\n\n{HEADER}\n",
        query.trim(),
        generated.format("%Y-%m-%d %H:%M UTC")
    );
    for (i, r) in records.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            i + 1,
            cell(&r.title),
            cell(&r.url),
            cell(&r.summary),
            cell(&r.key_facts.join("; ")),
            cell(r.published.as_deref().unwrap_or_default()),
        ));
    }
    out.push_str("\n## Trends\n\n");
    out.push_str(trends.trim());
    out.push('\n');
    out
}
