use super::{Tool, ToolError};
use crate::action::{ActionKind, AgentAction};
use async_trait::async_trait;
use sherpa_drivers::{BrowserDriver, WaitPolicy};
use tracing::info;

/// Go to a URL, wait for the load to settle and return the page source.
pub struct NavigateTool;

#[async_trait]
impl Tool for NavigateTool {
    fn kind(&self) -> ActionKind {
        ActionKind::Navigate
    }

    fn name(&self) -> &'static str {
        "navigate_to_url"
    }

    async fn invoke(
        &self,
        page: &dyn BrowserDriver,
        action: &AgentAction,
    ) -> Result<String, ToolError> {
        let AgentAction::Navigate { url } = action else {
            return Err(ToolError::WrongAction(action.kind(), self.name()));
        };
        info!(target: "agent.tool", %url, "tool.navigate");
        page.navigate(url, WaitPolicy::Load)
            .await
            .map_err(ToolError::driver(self.name()))?;
        page.content().await.map_err(ToolError::driver(self.name()))
    }
}
