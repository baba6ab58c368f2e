//! Driver layer for browser automation.
//!
//! - [`browser::BrowserDriver`]: the page contract the agent and pipeline use
//! - [`webdriver::WebDriverPage`]: `fantoccini`-backed implementation
//! - [`behavioral::BehavioralEngine`]: human‑like timings and typing
//! - [`diagnostics`]: HTML/screenshot dumps for failed lookups
pub mod behavioral;
pub mod browser;
pub mod diagnostics;
pub mod launch;
pub mod webdriver;

pub use browser::{
    BrowserDriver, DriverError, DriverResult, ElementHandle, PageFactory, WaitPolicy,
};
pub use webdriver::{WebDriverFactory, WebDriverPage, DEFAULT_WEBDRIVER_URL};
