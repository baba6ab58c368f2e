//! Document loaders used by the extraction stage.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use sherpa_agent::action::AgentAction;
use sherpa_agent::tools::{NavigateTool, Tool};
use sherpa_drivers::PageFactory;
use sherpa_http::{HttpClient, RequestOpts};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches the HTML of one URL.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn load(&self, url: &str) -> Result<String>;
}

/// Plain HTTP GET.
#[derive(Clone)]
pub struct HttpDocumentLoader {
    client: HttpClient,
    timeout: Duration,
}

impl HttpDocumentLoader {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl DocumentLoader for HttpDocumentLoader {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn load(&self, url: &str) -> Result<String> {
        let opts = RequestOpts {
            timeout: Some(self.timeout),
            retries: Some(1),
            ..Default::default()
        };
        let html = self
            .client
            .get_text(url, opts)
            .await
            .with_context(|| format!("GET {url}"))?;
        debug!(target: "pipeline.loader", %url, bytes = html.len(), "loader.http");
        Ok(html)
    }
}

/// Opens a page of its own for every load and drives it with the navigate
/// tool, for sites that only render in a browser.
pub struct BrowserDocumentLoader {
    factory: Arc<dyn PageFactory>,
}

impl BrowserDocumentLoader {
    pub fn new(factory: Arc<dyn PageFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl DocumentLoader for BrowserDocumentLoader {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn load(&self, url: &str) -> Result<String> {
        let page = self.factory.open().await.context("opening extraction page")?;
        let action = AgentAction::Navigate {
            url: url.to_string(),
        };
        let loaded = NavigateTool.invoke(page.as_ref(), &action).await;
        if let Err(e) = page.close().await {
            warn!(target: "pipeline.loader", %url, error = %e, "closing extraction page failed");
        }
        Ok(loaded?)
    }
}
