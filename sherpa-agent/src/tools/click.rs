use super::{Tool, ToolError, ELEMENT_WAIT};
use crate::action::{ActionKind, AgentAction};
use async_trait::async_trait;
use sherpa_drivers::{BrowserDriver, DriverError};
use std::time::Duration;
use tracing::{debug, warn};

/// Search box used when a click target cannot be found.
pub const SEARCH_INPUT: &str = "input[name=\"q\"], textarea[name=\"q\"]";

const NAVIGATION_WAIT: Duration = Duration::from_secs(3);

/// Click an element. A click that triggers a navigation waits for the new
/// URL before returning; a missing target falls back to submitting the
/// search box.
pub struct ClickTool;

impl ClickTool {
    async fn click_and_follow(page: &dyn BrowserDriver, selector: &str) -> Result<(), DriverError> {
        page.wait_for_selector(selector, ELEMENT_WAIT).await?;
        let before = page.current_url().await?;
        page.click(selector).await?;
        let navigated = page.wait_for_navigation(&before, NAVIGATION_WAIT).await?;
        debug!(target: "agent.tool", %selector, navigated, "tool.click");
        Ok(())
    }

    async fn submit_search(page: &dyn BrowserDriver) -> Result<(), DriverError> {
        page.focus(SEARCH_INPUT).await?;
        page.press_enter(SEARCH_INPUT).await
    }
}

#[async_trait]
impl Tool for ClickTool {
    fn kind(&self) -> ActionKind {
        ActionKind::Click
    }

    fn name(&self) -> &'static str {
        "click_element"
    }

    async fn invoke(
        &self,
        page: &dyn BrowserDriver,
        action: &AgentAction,
    ) -> Result<String, ToolError> {
        let AgentAction::Click { selector } = action else {
            return Err(ToolError::WrongAction(action.kind(), self.name()));
        };

        match Self::click_and_follow(page, selector).await {
            Ok(()) => {}
            Err(e) if e.is_missing_element() => {
                warn!(target: "agent.tool", %selector, error = %e, "click target missing; submitting search box");
                Self::submit_search(page).await.map_err(|fallback| ToolError::Failed {
                    tool: self.name(),
                    reason: format!("{e}; search submit fallback: {fallback}"),
                })?;
            }
            Err(e) => return Err(ToolError::Driver { tool: self.name(), source: e }),
        }

        page.content().await.map_err(ToolError::driver(self.name()))
    }
}
