//! Selector resolution with a deterministic fallback order.
//!
//! Lookups never fail with an error: the outcome is data, and the caller
//! decides whether an exhausted lookup is worth surfacing.

use serde::Serialize;
use sherpa_drivers::{BrowserDriver, ElementHandle};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub const PRIMARY_WAIT: Duration = Duration::from_secs(4);
pub const CANDIDATE_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub selector: String,
    pub index: usize,
    /// Text seen when the candidate was collected; re-read on resolution.
    pub text: String,
}

impl Candidate {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
            text: String::new(),
        }
    }

    fn key(&self) -> String {
        key(&self.selector, self.index)
    }
}

fn key(selector: &str, index: usize) -> String {
    format!("{selector}#{index}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        text: String,
        selector: String,
        index: usize,
    },
    Exhausted {
        last_error: String,
    },
}

impl Resolution {
    pub fn text(&self) -> Option<&str> {
        match self {
            Resolution::Found { text, .. } => Some(text),
            Resolution::Exhausted { .. } => None,
        }
    }
}

/// Scan `selectors` in order and keep every match with non-empty text,
/// de-duplicated by `selector+index`.
pub async fn collect_candidates(page: &dyn BrowserDriver, selectors: &[&str]) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for selector in selectors {
        let Ok(handles) = page.query_all(selector).await else {
            continue;
        };
        for handle in handles {
            if !seen.insert(key(&handle.selector, handle.index)) {
                continue;
            }
            if let Ok(text) = page.read_text(&handle).await {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(Candidate {
                        selector: handle.selector,
                        index: handle.index,
                        text: text.to_string(),
                    });
                }
            }
        }
    }
    out
}

async fn attempt(
    page: &dyn BrowserDriver,
    selector: &str,
    index: usize,
    wait: Duration,
) -> Result<String, String> {
    page.wait_for_selector(selector, wait)
        .await
        .map_err(|e| e.to_string())?;
    let text = page
        .read_text(&ElementHandle::new(selector, index))
        .await
        .map_err(|e| e.to_string())?;
    let text = text.trim();
    if text.is_empty() {
        Err(format!("`{selector}`[{index}] has no text"))
    } else {
        Ok(text.to_string())
    }
}

/// Return the first non-empty text in priority order:
/// the primary `(selector, index)`, then `candidates[index]`, then every
/// remaining candidate not tried yet.
pub async fn resolve_text(
    page: &dyn BrowserDriver,
    selector: &str,
    index: usize,
    candidates: &[Candidate],
) -> Resolution {
    match resolve_primary(page, selector, index).await {
        Ok(found) => found,
        Err(last_error) => resolve_candidates(page, selector, index, candidates, last_error).await,
    }
}

/// Like [`resolve_text`], but candidates are only collected from
/// `fallback_selectors` once the primary selector has missed.
pub async fn resolve_text_or_collect(
    page: &dyn BrowserDriver,
    selector: &str,
    index: usize,
    fallback_selectors: &[&str],
) -> Resolution {
    match resolve_primary(page, selector, index).await {
        Ok(found) => found,
        Err(last_error) => {
            let candidates = collect_candidates(page, fallback_selectors).await;
            resolve_candidates(page, selector, index, &candidates, last_error).await
        }
    }
}

async fn resolve_primary(
    page: &dyn BrowserDriver,
    selector: &str,
    index: usize,
) -> Result<Resolution, Option<String>> {
    if selector.trim().is_empty() {
        return Err(None);
    }
    match attempt(page, selector, index, PRIMARY_WAIT).await {
        Ok(text) => Ok(Resolution::Found {
            text,
            selector: selector.to_string(),
            index,
        }),
        Err(e) => Err(Some(e)),
    }
}

async fn resolve_candidates(
    page: &dyn BrowserDriver,
    selector: &str,
    index: usize,
    candidates: &[Candidate],
    mut last_error: Option<String>,
) -> Resolution {
    let mut seen: HashSet<String> = HashSet::new();
    if !selector.trim().is_empty() {
        seen.insert(key(selector, index));
    }

    let positional = candidates.get(index).into_iter();
    let rest = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, c)| c);

    for (pass, candidate) in positional.chain(rest).enumerate() {
        if !seen.insert(candidate.key()) {
            continue;
        }
        debug!(
            target: "agent.selector",
            pass,
            selector = %candidate.selector,
            index = candidate.index,
            "selector.fallback"
        );
        match attempt(page, &candidate.selector, candidate.index, CANDIDATE_WAIT).await {
            Ok(text) => {
                return Resolution::Found {
                    text,
                    selector: candidate.selector.clone(),
                    index: candidate.index,
                }
            }
            Err(e) => last_error = Some(e),
        }
    }

    Resolution::Exhausted {
        last_error: last_error.unwrap_or_else(|| "no candidates matched".to_string()),
    }
}
