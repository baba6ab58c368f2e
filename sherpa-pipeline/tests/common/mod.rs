#![allow(dead_code)]

use async_trait::async_trait;
use sherpa_common::Result;
use sherpa_drivers::{
    BrowserDriver, DriverError, DriverResult, ElementHandle, PageFactory, WaitPolicy,
};
use sherpa_llm::traits::{LlmClient, LlmResponse, Prompt};
use sherpa_llm::SharedLlm;
use sherpa_pipeline::prompts;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Structure,
    Record,
    Trends,
}

/// Model double keyed by pipeline stage; gets the flattened prompt too.
pub struct ScriptedLlm<F> {
    script: F,
}

impl<F> ScriptedLlm<F>
where
    F: Fn(Stage, &str) -> String + Send + Sync + 'static,
{
    pub fn shared(script: F) -> SharedLlm {
        Arc::new(Self { script })
    }
}

#[async_trait]
impl<F> LlmClient for ScriptedLlm<F>
where
    F: Fn(Stage, &str) -> String + Send + Sync + 'static,
{
    async fn invoke(&self, prompt: Prompt) -> Result<LlmResponse> {
        let text = prompt.flatten();
        let stage = if text.starts_with(prompts::STRUCTURE_SYSTEM) {
            Stage::Structure
        } else if text.starts_with(prompts::RECORD_SYSTEM) {
            Stage::Record
        } else {
            Stage::Trends
        };
        Ok(LlmResponse::from_text((self.script)(stage, &text)))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct WebState {
    url: String,
    /// Rendered body text per URL prefix.
    bodies: Vec<(String, String)>,
    /// Page source per exact URL.
    pages: HashMap<String, String>,
    navigations: Vec<String>,
    opened: usize,
}

/// A browser over canned pages. Every page a [`FakeWeb`] opens shares its
/// state.
#[derive(Clone, Default)]
pub struct FakeWeb {
    state: Arc<Mutex<WebState>>,
}

impl FakeWeb {
    pub fn with_body(self, url_prefix: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .bodies
            .push((url_prefix.to_string(), text.to_string()));
        self
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), html.to_string());
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn factory(&self) -> Arc<dyn PageFactory> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl PageFactory for FakeWeb {
    async fn open(&self) -> DriverResult<Box<dyn BrowserDriver>> {
        self.state.lock().unwrap().opened += 1;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl BrowserDriver for FakeWeb {
    async fn navigate(&self, url: &str, _wait: WaitPolicy) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        Err(DriverError::NotFound(selector.to_string()))
    }

    async fn type_text(&self, selector: &str, _text: &str) -> DriverResult<()> {
        Err(DriverError::NotFound(selector.to_string()))
    }

    async fn focus(&self, selector: &str) -> DriverResult<()> {
        Err(DriverError::NotFound(selector.to_string()))
    }

    async fn press_enter(&self, selector: &str) -> DriverResult<()> {
        Err(DriverError::NotFound(selector.to_string()))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        Err(DriverError::Timeout {
            selector: selector.to_string(),
            waited_ms: timeout.as_millis() as u64,
        })
    }

    async fn query_all(&self, _selector: &str) -> DriverResult<Vec<ElementHandle>> {
        Ok(Vec::new())
    }

    async fn read_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        let state = self.state.lock().unwrap();
        if handle.selector == "body" {
            if let Some((_, text)) = state.bodies.iter().find(|(p, _)| state.url.starts_with(p)) {
                return Ok(text.clone());
            }
        }
        Err(DriverError::NotFound(handle.selector.clone()))
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn content(&self) -> DriverResult<String> {
        let state = self.state.lock().unwrap();
        Ok(state.pages.get(&state.url).cloned().unwrap_or_default())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(Vec::new())
    }
}
