//! Search stage: paginate a result page, cut its text into URL-anchored
//! blocks and let the model structure them.

use crate::html::text_from_html;
use crate::prompts;
use anyhow::{Context as _, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sherpa_drivers::{BrowserDriver, ElementHandle, WaitPolicy};
use sherpa_llm::decode::decode_value;
use sherpa_llm::SharedLlm;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Result page URL; the query goes into `q`.
    pub search_url: String,
    /// Query parameter carrying the result offset of pages after the first.
    pub offset_param: String,
    pub results_per_page: usize,
    pub page_cap: usize,
    pub max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_url: "https://html.duckduckgo.com/html/".to_string(),
            offset_param: "s".to_string(),
            results_per_page: 10,
            page_cap: 3,
            max_results: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("url regex compiles")
    })
}

/// URL of result page `page` (zero-based) for `query`.
pub fn page_url(settings: &SearchSettings, query: &str, page: usize) -> Result<Url> {
    let mut url = Url::parse(&settings.search_url)
        .with_context(|| format!("invalid search url {}", settings.search_url))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("q", query);
        if page > 0 {
            pairs.append_pair(
                &settings.offset_param,
                &(page * settings.results_per_page).to_string(),
            );
        }
    }
    Ok(url)
}

/// Split page text into blocks, starting a new block at every line that
/// holds a URL. Text before the first URL line is dropped.
pub fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if url_re().is_match(line) && !current.is_empty() {
            blocks.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks.retain(|b| url_re().is_match(b));
    blocks
}

/// Results the model returned, keeping entries whose URL parses as http(s).
/// Accepts a bare array or an object carrying `results`.
pub fn parse_results(reply: &str) -> Vec<SearchResult> {
    let items = match decode_value(reply) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut obj)) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(obj)],
        },
        Ok(_) => Vec::new(),
        Err(e) => {
            debug!(target: "pipeline.search", error = %e, "structured results not decodable");
            Vec::new()
        }
    };
    items
        .into_iter()
        .filter_map(|v| serde_json::from_value::<SearchResult>(v).ok())
        .filter_map(normalise)
        .collect()
}

fn normalise(result: SearchResult) -> Option<SearchResult> {
    let url = Url::parse(result.url.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))?;
    Some(SearchResult {
        title: result.title.trim().to_string(),
        url: url.to_string(),
        snippet: result.snippet.trim().to_string(),
    })
}

/// Rendered text of the page, falling back to stripping the page source.
async fn page_text(page: &dyn BrowserDriver) -> Result<String> {
    if let Ok(text) = page.read_text(&ElementHandle::new("body", 0)).await {
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }
    let html = page.content().await.context("reading result page")?;
    Ok(text_from_html(&html))
}

/// Collect up to `max_results` distinct results over at most `page_cap` pages.
pub async fn search(
    llm: &SharedLlm,
    page: &dyn BrowserDriver,
    settings: &SearchSettings,
    query: &str,
) -> Result<Vec<SearchResult>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut results = Vec::new();

    for page_idx in 0..settings.page_cap {
        if results.len() >= settings.max_results {
            break;
        }
        let url = page_url(settings, query, page_idx)?;
        if let Err(e) = page.navigate(url.as_str(), WaitPolicy::DomContentLoaded).await {
            if page_idx == 0 {
                return Err(e).with_context(|| format!("loading {url}"));
            }
            warn!(target: "pipeline.search", page = page_idx, error = %e, "result page failed; stopping pagination");
            break;
        }

        let text = page_text(page).await?;
        let blocks = split_blocks(&text);
        if blocks.is_empty() {
            debug!(target: "pipeline.search", page = page_idx, "no url blocks; stopping pagination");
            break;
        }

        let reply = match llm.invoke(prompts::structure_results(query, &blocks)).await {
            Ok(r) => r.text,
            Err(e) => {
                warn!(target: "pipeline.search", page = page_idx, error = %e, "structuring failed");
                continue;
            }
        };

        let mut fresh = 0usize;
        for result in parse_results(&reply) {
            if results.len() >= settings.max_results {
                break;
            }
            if seen.insert(result.url.clone()) {
                results.push(result);
                fresh += 1;
            }
        }
        info!(
            target: "pipeline.search",
            page = page_idx,
            blocks = blocks.len(),
            fresh,
            total = results.len(),
            "search.page"
        );
    }

    Ok(results)
}
