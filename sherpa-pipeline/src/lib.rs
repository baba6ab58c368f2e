//! Batch research pipeline.
//!
//! - [`search`]: paginated result pages cut into URL blocks, structured by the model
//! - [`extract`]: concurrent per-result extraction into [`PageRecord`]s
//! - trend synthesis over every record
//! - [`report`]: markdown table plus the trends text
//!
//! Unlike the interactive workflow there is no loop: each stage runs once.

pub mod extract;
pub mod html;
pub mod loader;
pub mod prompts;
pub mod report;
pub mod search;

pub use extract::{Extractor, PageRecord};
pub use loader::{BrowserDocumentLoader, DocumentLoader, HttpDocumentLoader};
pub use search::{SearchResult, SearchSettings};

use anyhow::{Context as _, Result};
use serde::Serialize;
use sherpa_common::observability::run_span;
use sherpa_drivers::PageFactory;
use sherpa_http::HttpClient;
use sherpa_llm::SharedLlm;
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Research {
    pub run_id: String,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub records: Vec<PageRecord>,
    pub trends: String,
    pub report: String,
}

pub struct Pipeline {
    llm: SharedLlm,
    factory: Arc<dyn PageFactory>,
    http: Option<HttpClient>,
    settings: SearchSettings,
    text_chars: usize,
}

impl Pipeline {
    pub fn new(llm: SharedLlm, factory: Arc<dyn PageFactory>) -> Self {
        Self {
            llm,
            factory,
            http: None,
            settings: SearchSettings::default(),
            text_chars: 4000,
        }
    }

    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fetch documents over HTTP first, using browser pages only as fallback.
    pub fn with_http(mut self, client: HttpClient) -> Self {
        self.http = Some(client);
        self
    }

    pub fn with_text_chars(mut self, chars: usize) -> Self {
        self.text_chars = chars;
        self
    }

    fn extractor(&self) -> Extractor {
        let browser: Arc<dyn DocumentLoader> =
            Arc::new(BrowserDocumentLoader::new(Arc::clone(&self.factory)));
        let extractor = match &self.http {
            Some(client) => Extractor::new(
                self.llm.clone(),
                Arc::new(HttpDocumentLoader::new(client.clone())),
            )
            .with_fallback(browser),
            None => Extractor::new(self.llm.clone(), browser),
        };
        extractor.with_text_chars(self.text_chars)
    }

    async fn trends(&self, query: &str, records: &[PageRecord]) -> String {
        if records.is_empty() {
            return "No results to analyse.".to_string();
        }
        match self.llm.invoke(prompts::trends(query, records)).await {
            Ok(r) if !r.text.trim().is_empty() => r.text.trim().to_string(),
            Ok(_) => "No trends identified.".to_string(),
            Err(e) => {
                warn!(target: "pipeline", error = %e, "trend synthesis failed");
                format!("Trend analysis unavailable: {e}")
            }
        }
    }

    /// Search, extract, summarise and render a report for `query`.
    pub async fn run(&self, query: &str) -> Result<Research> {
        let run_id = Uuid::new_v4().to_string();
        let span = run_span("pipeline", &run_id, query);
        async move {
            info!(target: "pipeline", %query, "pipeline.start");
            let page = self.factory.open().await.context("opening search page")?;
            let searched = search::search(&self.llm, page.as_ref(), &self.settings, query).await;
            if let Err(e) = page.close().await {
                warn!(target: "pipeline", error = %e, "closing search page failed");
            }
            let results = searched?;
            info!(target: "pipeline", results = results.len(), "pipeline.search.done");

            let records = Arc::new(self.extractor())
                .extract_all(query, &results)
                .await;
            let trends = self.trends(query, &records).await;
            let report = report::render(query, &records, &trends, chrono::Utc::now());
            info!(target: "pipeline", records = records.len(), "pipeline.end");

            Ok(Research {
                run_id,
                query: query.to_string(),
                results,
                records,
                trends,
                report,
            })
        }
        .instrument(span)
        .await
    }
}
