use crate::behavioral::BehavioralEngine;
use crate::browser::{
    BrowserDriver, DriverError, DriverResult, ElementHandle, PageFactory, WaitPolicy,
};
use crate::launch::{capabilities, LaunchOptions, CORE_EVASIONS};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use webdriver::capabilities::Capabilities;

/// Default Chromedriver endpoint.
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

const READY_STATE_TIMEOUT: Duration = Duration::from_secs(10);
const LOAD_SETTLE: Duration = Duration::from_millis(500);
const ACTION_WAIT: Duration = Duration::from_secs(5);

/// One WebDriver session viewed as a single page.
pub struct WebDriverPage {
    client: Client,
    behavioral: BehavioralEngine,
}

impl WebDriverPage {
    /// Connect a new session to the WebDriver service at `webdriver_url`.
    pub async fn connect(
        webdriver_url: &str,
        launch: &LaunchOptions,
        behavioral: BehavioralEngine,
    ) -> DriverResult<Self> {
        let caps: Capabilities = capabilities(launch);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await
            .map_err(|e| DriverError::Session(format!("connect {webdriver_url}: {e}")))?;
        debug!(target: "browser.session", %webdriver_url, headless = launch.headless, "session.open");
        Ok(Self { client, behavioral })
    }

    async fn element(&self, selector: &str, timeout: Duration) -> DriverResult<Element> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| map_cmd(e, selector, timeout))
    }

    async fn ready_state(&self) -> DriverResult<String> {
        let state = self
            .client
            .execute("return document.readyState;", vec![])
            .await
            .map_err(|e| DriverError::Other(e.into()))?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }

    async fn wait_ready(&self, accept: impl Fn(&str) -> bool) -> DriverResult<()> {
        let deadline = Instant::now() + READY_STATE_TIMEOUT;
        while Instant::now() < deadline {
            if accept(&self.ready_state().await?) {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        Err(DriverError::Timeout {
            selector: "document.readyState".to_string(),
            waited_ms: READY_STATE_TIMEOUT.as_millis() as u64,
        })
    }
}

fn map_cmd(err: CmdError, selector: &str, waited: Duration) -> DriverError {
    match err {
        CmdError::WaitTimeout => DriverError::Timeout {
            selector: selector.to_string(),
            waited_ms: waited.as_millis() as u64,
        },
        e if e.is_no_such_element() => DriverError::NotFound(selector.to_string()),
        e => DriverError::Other(e.into()),
    }
}

#[async_trait]
impl BrowserDriver for WebDriverPage {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> DriverResult<()> {
        self.client
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        match wait {
            WaitPolicy::Commit => {}
            WaitPolicy::DomContentLoaded => self.wait_ready(|s| s != "loading").await?,
            WaitPolicy::Load => {
                self.wait_ready(|s| s == "complete").await?;
                sleep(LOAD_SETTLE).await;
            }
        }

        if let Err(e) = self.client.execute(CORE_EVASIONS, vec![]).await {
            warn!(target: "browser.session", error = %e, "evasion script failed");
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        let el = self.element(selector, ACTION_WAIT).await?;
        self.behavioral.random_delay(50, 200).await;
        el.click().await.map_err(|e| map_cmd(e, selector, ACTION_WAIT))
    }

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()> {
        let el = self.element(selector, ACTION_WAIT).await?;
        el.clear().await.map_err(|e| map_cmd(e, selector, ACTION_WAIT))?;
        self.behavioral
            .type_text_human_like(&el, text)
            .await
            .map_err(DriverError::Other)
    }

    async fn focus(&self, selector: &str) -> DriverResult<()> {
        let el = self.element(selector, ACTION_WAIT).await?;
        let arg = serde_json::to_value(&el).map_err(|e| DriverError::Other(e.into()))?;
        self.client
            .execute("arguments[0].focus();", vec![arg])
            .await
            .map(|_| ())
            .map_err(|e| map_cmd(e, selector, ACTION_WAIT))
    }

    async fn press_enter(&self, selector: &str) -> DriverResult<()> {
        let el = self.element(selector, ACTION_WAIT).await?;
        el.send_keys(&char::from(Key::Enter).to_string())
            .await
            .map_err(|e| map_cmd(e, selector, ACTION_WAIT))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.element(selector, timeout).await.map(|_| ())
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let found = self
            .client
            .find_all(Locator::Css(selector))
            .await
            .map_err(|e| map_cmd(e, selector, Duration::ZERO))?;
        Ok((0..found.len())
            .map(|i| ElementHandle::new(selector, i))
            .collect())
    }

    async fn read_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        let mut found = self
            .client
            .find_all(Locator::Css(&handle.selector))
            .await
            .map_err(|e| map_cmd(e, &handle.selector, Duration::ZERO))?;
        if handle.index >= found.len() {
            return Err(DriverError::NotFound(format!(
                "{}[{}]",
                handle.selector, handle.index
            )));
        }
        found
            .swap_remove(handle.index)
            .text()
            .await
            .map_err(|e| map_cmd(e, &handle.selector, Duration::ZERO))
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.client
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(|e| DriverError::Other(e.into()))
    }

    async fn content(&self) -> DriverResult<String> {
        self.client
            .source()
            .await
            .map_err(|e| DriverError::Other(e.into()))
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.client
            .screenshot()
            .await
            .map_err(|e| DriverError::Other(e.into()))
    }

    async fn close(&self) -> DriverResult<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::Session(e.to_string()))
    }
}

/// Opens one WebDriver session per page.
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    pub webdriver_url: String,
    pub launch: LaunchOptions,
    pub behavioral: BehavioralEngine,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: impl Into<String>, launch: LaunchOptions) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            launch,
            behavioral: BehavioralEngine::default(),
        }
    }

    pub fn with_behavioral(mut self, behavioral: BehavioralEngine) -> Self {
        self.behavioral = behavioral;
        self
    }
}

#[async_trait]
impl PageFactory for WebDriverFactory {
    async fn open(&self) -> DriverResult<Box<dyn BrowserDriver>> {
        let page =
            WebDriverPage::connect(&self.webdriver_url, &self.launch, self.behavioral.clone())
                .await?;
        Ok(Box::new(page))
    }
}
