//! Extraction stage: one spawned task per search result.

use crate::html::{text_from_html, title_from_html};
use crate::loader::DocumentLoader;
use crate::prompts;
use crate::search::SearchResult;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sherpa_common::preview;
use sherpa_llm::decode::{decode_json, DecodeError};
use sherpa_llm::SharedLlm;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// What the report knows about one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub key_facts: Vec<String>,
    pub published: Option<String>,
}

impl PageRecord {
    /// Record built only from what the search stage already knew.
    pub fn fallback(result: &SearchResult) -> Self {
        Self {
            title: if result.title.is_empty() {
                result.url.clone()
            } else {
                result.title.clone()
            },
            url: result.url.clone(),
            summary: result.snippet.clone(),
            key_facts: Vec::new(),
            published: None,
        }
    }
}

/// Decode and check a model reply against the record schema. The URL always
/// comes from the search result.
pub fn parse_record(reply: &str, result: &SearchResult) -> Result<PageRecord, DecodeError> {
    let mut record: PageRecord = decode_json(reply)?;
    if record.summary.trim().is_empty() {
        return Err(DecodeError::Shape("empty `summary`".into()));
    }
    if record.title.trim().is_empty() {
        record.title = PageRecord::fallback(result).title;
    }
    record.url = result.url.clone();
    record.key_facts.retain(|f| !f.trim().is_empty());
    record.published = record.published.filter(|p| !p.trim().is_empty());
    Ok(record)
}

pub struct Extractor {
    llm: SharedLlm,
    loader: Arc<dyn DocumentLoader>,
    fallback: Option<Arc<dyn DocumentLoader>>,
    text_chars: usize,
}

impl Extractor {
    pub fn new(llm: SharedLlm, loader: Arc<dyn DocumentLoader>) -> Self {
        Self {
            llm,
            loader,
            fallback: None,
            text_chars: 4000,
        }
    }

    /// Loader tried when the primary one fails or yields no text.
    pub fn with_fallback(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.fallback = Some(loader);
        self
    }

    pub fn with_text_chars(mut self, chars: usize) -> Self {
        self.text_chars = chars;
        self
    }

    async fn load(&self, url: &str) -> Option<String> {
        let loaders = std::iter::once(&self.loader).chain(self.fallback.as_ref());
        for loader in loaders {
            match loader.load(url).await {
                Ok(html) if !text_from_html(&html).is_empty() => return Some(html),
                Ok(_) => {
                    debug!(target: "pipeline.extract", %url, loader = loader.name(), "document empty")
                }
                Err(e) => {
                    warn!(target: "pipeline.extract", %url, loader = loader.name(), error = %e, "document load failed")
                }
            }
        }
        None
    }

    /// Extract one record. Never fails: every failure yields the fallback.
    pub async fn extract_one(&self, query: &str, result: &SearchResult) -> PageRecord {
        let Some(html) = self.load(&result.url).await else {
            return PageRecord::fallback(result);
        };
        let mut text = text_from_html(&html);
        if let Some(title) = title_from_html(&html) {
            text = format!("Title: {title}\n{text}");
        }

        let prompt = prompts::extract_record(query, &result.url, preview(&text, self.text_chars));
        let reply = match self.llm.invoke(prompt).await {
            Ok(r) => r.text,
            Err(e) => {
                warn!(target: "pipeline.extract", url = %result.url, error = %e, "model call failed");
                return PageRecord::fallback(result);
            }
        };
        match parse_record(&reply, result) {
            Ok(record) => record,
            Err(e) => {
                warn!(target: "pipeline.extract", url = %result.url, error = %e, "record rejected; using search snippet");
                PageRecord::fallback(result)
            }
        }
    }

    /// Extract every result concurrently. Output order follows `results`;
    /// a task that dies yields its fallback record.
    pub async fn extract_all(self: &Arc<Self>, query: &str, results: &[SearchResult]) -> Vec<PageRecord> {
        let handles: Vec<_> = results
            .iter()
            .cloned()
            .map(|result| {
                let this = Arc::clone(self);
                let query = query.to_string();
                tokio::spawn(
                    async move { this.extract_one(&query, &result).await }
                        .instrument(tracing::Span::current()),
                )
            })
            .collect();

        let records: Vec<PageRecord> = join_all(handles)
            .await
            .into_iter()
            .zip(results)
            .map(|(joined, result)| {
                joined.unwrap_or_else(|e| {
                    warn!(target: "pipeline.extract", url = %result.url, error = %e, "extraction task died");
                    PageRecord::fallback(result)
                })
            })
            .collect();
        info!(target: "pipeline.extract", records = records.len(), "extract.done");
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> SearchResult {
        SearchResult {
            title: "Rust".into(),
            url: "https://www.rust-lang.org/".into(),
            snippet: "A language empowering everyone".into(),
        }
    }

    #[test]
    fn fallback_uses_snippet_and_url() {
        let record = PageRecord::fallback(&SearchResult {
            title: String::new(),
            ..result()
        });
        assert_eq!(record.title, "https://www.rust-lang.org/");
        assert_eq!(record.summary, "A language empowering everyone");
        assert!(record.key_facts.is_empty());
        assert_eq!(record.published, None);
    }

    #[test]
    fn record_url_comes_from_the_result() {
        let reply = r#"{"title": "", "url": "https://elsewhere/", "summary": "Fast.",
                        "key_facts": ["safe", " "], "published": ""}"#;
        let record = parse_record(reply, &result()).unwrap();
        assert_eq!(record.url, "https://www.rust-lang.org/");
        assert_eq!(record.title, "Rust");
        assert_eq!(record.key_facts, vec!["safe"]);
        assert_eq!(record.published, None);
    }

    #[test]
    fn records_missing_fields_are_rejected() {
        assert!(parse_record(r#"{"title": "x", "summary": "y"}"#, &result()).is_err());
        assert!(parse_record(
            r#"{"title": "x", "url": "u", "summary": " ", "key_facts": []}"#,
            &result()
        )
        .is_err());
    }
}
