use super::{Tool, ToolError, ELEMENT_WAIT};
use crate::action::{ActionKind, AgentAction};
use async_trait::async_trait;
use sherpa_drivers::BrowserDriver;

pub struct TypeTool;

#[async_trait]
impl Tool for TypeTool {
    fn kind(&self) -> ActionKind {
        ActionKind::Type
    }

    fn name(&self) -> &'static str {
        "type_text"
    }

    async fn invoke(
        &self,
        page: &dyn BrowserDriver,
        action: &AgentAction,
    ) -> Result<String, ToolError> {
        let AgentAction::Type { selector, text } = action else {
            return Err(ToolError::WrongAction(action.kind(), self.name()));
        };
        page.wait_for_selector(selector, ELEMENT_WAIT)
            .await
            .map_err(ToolError::driver(self.name()))?;
        page.type_text(selector, text)
            .await
            .map_err(ToolError::driver(self.name()))?;
        page.content().await.map_err(ToolError::driver(self.name()))
    }
}
