use crate::extract::PageRecord;
use sherpa_llm::traits::{ChatMessage, Prompt};

pub const STRUCTURE_SYSTEM: &str = r#"You turn raw search-result text into structured results.
Reply with a JSON array only: [{"title": "...", "url": "https://...", "snippet": "..."}].
Use exactly one object per block that names a web page; copy URLs verbatim. No other text."#;

pub const RECORD_SYSTEM: &str = r#"You extract facts from a web page.
Reply with one JSON object only:
{"title": "...", "url": "...", "summary": "...", "key_facts": ["..."], "published": "YYYY-MM-DD" | null}
`summary` is at most three sentences. `published` is null unless the page states a date."#;

pub const TRENDS_SYSTEM: &str = r#"You are a research analyst.
Given page summaries, list the main trends as short markdown bullet points ("- ..."). No preamble."#;

pub fn structure_results(query: &str, blocks: &[String]) -> Prompt {
    let numbered = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| format!("[{}]\n{b}", i + 1))
        .collect::<Vec<_>>()
        .join("\n\n");
    Prompt::from(vec![
        ChatMessage::system(STRUCTURE_SYSTEM),
        ChatMessage::user(format!("Query: {query}\nBlocks:\n{numbered}")),
    ])
}

pub fn extract_record(query: &str, url: &str, page_text: &str) -> Prompt {
    Prompt::from(vec![
        ChatMessage::system(RECORD_SYSTEM),
        ChatMessage::user(format!(
            "Research query: {query}\nURL: {url}\nPage text:\n{page_text}"
        )),
    ])
}

pub fn trends(query: &str, records: &[PageRecord]) -> Prompt {
    let summaries = records
        .iter()
        .map(|r| format!("- {} ({}): {}", r.title, r.url, r.summary))
        .collect::<Vec<_>>()
        .join("\n");
    Prompt::from(vec![
        ChatMessage::system(TRENDS_SYSTEM),
        ChatMessage::user(format!("Research query: {query}\nSummaries:\n{summaries}")),
    ])
}
