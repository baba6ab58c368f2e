#![allow(dead_code)]

use async_trait::async_trait;
use sherpa_agent::prompts;
use sherpa_common::Result;
use sherpa_drivers::{BrowserDriver, DriverError, DriverResult, ElementHandle, WaitPolicy};
use sherpa_llm::traits::{LlmClient, LlmResponse, Prompt};
use sherpa_llm::SharedLlm;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Which node a prompt came from, read off its system message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Analyze,
    Extract,
    Completion,
    Other,
}

impl Stage {
    fn of(prompt: &Prompt) -> Self {
        let text = prompt.flatten();
        if text.starts_with(prompts::PLAN_SYSTEM) {
            Stage::Plan
        } else if text.starts_with(prompts::ACTION_SYSTEM) {
            Stage::Analyze
        } else if text.starts_with(prompts::EXTRACT_SYSTEM) {
            Stage::Extract
        } else if text.starts_with(prompts::COMPLETION_SYSTEM) {
            Stage::Completion
        } else {
            Stage::Other
        }
    }
}

type Script = dyn Fn(Stage, usize) -> String + Send + Sync;

/// Model double answering from a script keyed by stage and the number of
/// earlier calls for that stage.
pub struct ScriptedLlm {
    script: Box<Script>,
    counts: Mutex<HashMap<&'static str, usize>>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn shared(script: impl Fn(Stage, usize) -> String + Send + Sync + 'static) -> SharedLlm {
        Arc::new(Self {
            script: Box::new(script),
            counts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }
}

fn stage_key(stage: Stage) -> &'static str {
    match stage {
        Stage::Plan => "plan",
        Stage::Analyze => "analyze",
        Stage::Extract => "extract",
        Stage::Completion => "completion",
        Stage::Other => "other",
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(&self, prompt: Prompt) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stage = Stage::of(&prompt);
        let nth = {
            let mut counts = self.counts.lock().unwrap();
            let n = counts.entry(stage_key(stage)).or_insert(0);
            let current = *n;
            *n += 1;
            current
        };
        Ok(LlmResponse::from_text((self.script)(stage, nth)))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub const PLAN_REPLY: &str = r#"{"steps": ["look around"], "refined_query": "rust release"}"#;
pub const FINISH: &str = r#"{"action": "finish", "arguments": {}}"#;

#[derive(Default)]
struct FakeState {
    url: String,
    pages: HashMap<String, String>,
    elements: HashMap<String, Vec<String>>,
    calls: Vec<String>,
}

/// In-memory page. Clones share state, so a test keeps one clone to inspect
/// what the workflow did with the boxed other.
#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn at(url: &str) -> Self {
        let driver = Self::default();
        driver.state.lock().unwrap().url = url.to_string();
        driver
    }

    pub fn with_element(self, selector: &str, texts: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(selector.to_string(), texts.iter().map(|t| t.to_string()).collect());
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

    pub fn boxed(&self) -> Box<dyn BrowserDriver> {
        Box::new(self.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn has(&self, selector: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .elements
            .get(selector)
            .is_some_and(|t| !t.is_empty())
    }

    fn require(&self, selector: &str) -> DriverResult<()> {
        if self.has(selector) {
            Ok(())
        } else {
            Err(DriverError::NotFound(selector.to_string()))
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str, _wait: WaitPolicy) -> DriverResult<()> {
        self.log(format!("navigate {url}"));
        self.state.lock().unwrap().url = url.to_string();
        Ok(())
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        self.log(format!("click {selector}"));
        self.require(selector)
    }

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()> {
        self.log(format!("type {selector} {text}"));
        self.require(selector)
    }

    async fn focus(&self, selector: &str) -> DriverResult<()> {
        self.log(format!("focus {selector}"));
        self.require(selector)
    }

    async fn press_enter(&self, selector: &str) -> DriverResult<()> {
        self.log(format!("enter {selector}"));
        self.require(selector)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.log(format!("wait {selector}"));
        if self.has(selector) {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                selector: selector.to_string(),
                waited_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        self.log(format!("query {selector}"));
        let n = self
            .state
            .lock()
            .unwrap()
            .elements
            .get(selector)
            .map_or(0, Vec::len);
        Ok((0..n).map(|i| ElementHandle::new(selector, i)).collect())
    }

    async fn read_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        self.log(format!("read {}#{}", handle.selector, handle.index));
        self.state
            .lock()
            .unwrap()
            .elements
            .get(&handle.selector)
            .and_then(|t| t.get(handle.index).cloned())
            .ok_or_else(|| DriverError::NotFound(handle.selector.clone()))
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn content(&self) -> DriverResult<String> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pages
            .get(&state.url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn wait_for_navigation(&self, _from_url: &str, _timeout: Duration) -> DriverResult<bool> {
        Ok(false)
    }
}
