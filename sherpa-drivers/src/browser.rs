//! The browser contract the workflow engine and pipeline are written against.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How long [`BrowserDriver::navigate`] waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Return once the navigation command is acknowledged.
    Commit,
    /// Wait for `document.readyState` to leave `loading`.
    DomContentLoaded,
    /// Wait for `document.readyState == "complete"` plus a short settle delay.
    Load,
}

/// A stable reference to the `index`-th match of `selector`.
///
/// Handles are re-resolved on use, so they stay valid across re-renders that
/// keep the document order intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub selector: String,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("timed out after {waited_ms}ms waiting for `{selector}`")]
    Timeout { selector: String, waited_ms: u64 },

    #[error("no element matches `{0}`")]
    NotFound(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser session error: {0}")]
    Session(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriverError {
    /// Selector-level miss (absent or never appeared) as opposed to a broken session.
    pub fn is_missing_element(&self) -> bool {
        matches!(self, DriverError::Timeout { .. } | DriverError::NotFound(_))
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// One live page. Every operation may fail; callers treat failures as data.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> DriverResult<()>;

    async fn click(&self, selector: &str) -> DriverResult<()>;

    /// Replace the value of the first match of `selector` with `text`.
    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()>;

    async fn focus(&self, selector: &str) -> DriverResult<()>;

    /// Send the Enter key to the first match of `selector`.
    async fn press_enter(&self, selector: &str) -> DriverResult<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>>;

    async fn read_text(&self, handle: &ElementHandle) -> DriverResult<String>;

    async fn current_url(&self) -> DriverResult<String>;

    /// Full page source.
    async fn content(&self) -> DriverResult<String>;

    /// PNG bytes of the viewport.
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Poll until the URL differs from `from_url`. Returns whether it changed
    /// before `timeout`.
    async fn wait_for_navigation(&self, from_url: &str, timeout: Duration) -> DriverResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.current_url().await? != from_url {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}

/// Opens fresh, independently owned pages.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self) -> DriverResult<Box<dyn BrowserDriver>>;
}
