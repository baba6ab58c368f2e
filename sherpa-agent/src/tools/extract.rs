use super::{Tool, ToolError};
use crate::action::{ActionKind, AgentAction};
use crate::selector::{resolve_text_or_collect, Resolution};
use async_trait::async_trait;
use sherpa_drivers::BrowserDriver;
use tracing::info;

/// Known-good result containers of the common search engines, best first.
pub const SEARCH_RESULT_SELECTORS: [&str; 6] = [
    "#search .g",
    "#rso > div",
    "li.b_algo",
    ".result__body",
    "[data-testid=\"result\"]",
    "article",
];

/// Read the text of an element, falling back to search-result containers.
pub struct ExtractTool;

#[async_trait]
impl Tool for ExtractTool {
    fn kind(&self) -> ActionKind {
        ActionKind::Extract
    }

    fn name(&self) -> &'static str {
        "extract_text"
    }

    async fn invoke(
        &self,
        page: &dyn BrowserDriver,
        action: &AgentAction,
    ) -> Result<String, ToolError> {
        let AgentAction::Extract { selector, index } = action else {
            return Err(ToolError::WrongAction(action.kind(), self.name()));
        };

        match resolve_text_or_collect(page, selector, *index, &SEARCH_RESULT_SELECTORS).await {
            Resolution::Found {
                text,
                selector: used,
                index: used_index,
            } => {
                info!(
                    target: "agent.tool",
                    requested = %selector,
                    used = %used,
                    index = used_index,
                    chars = text.len(),
                    "tool.extract"
                );
                Ok(text)
            }
            Resolution::Exhausted { last_error } => Err(ToolError::Failed {
                tool: self.name(),
                reason: last_error,
            }),
        }
    }
}
