//! Typed registry of the browser tools the model can call.

mod click;
mod extract;
mod navigate;
mod type_text;

pub use click::{ClickTool, SEARCH_INPUT};
pub use extract::{ExtractTool, SEARCH_RESULT_SELECTORS};
pub use navigate::NavigateTool;
pub use type_text::TypeTool;

use crate::action::{ActionKind, AgentAction, ValidationError};
use async_trait::async_trait;
use serde_json::Value;
use sherpa_drivers::{BrowserDriver, DriverError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Wait applied before interacting with an element.
pub const ELEMENT_WAIT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{tool}: {source}")]
    Driver {
        tool: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("{tool}: {reason}")]
    Failed { tool: &'static str, reason: String },

    #[error("{0} is not handled by {1}")]
    WrongAction(crate::action::ActionKind, &'static str),
}

impl ToolError {
    pub(crate) fn driver(tool: &'static str) -> impl FnOnce(DriverError) -> ToolError {
        move |source| ToolError::Driver { tool, source }
    }

    /// Whether the failure lies with the arguments rather than the page.
    pub fn is_policy(&self) -> bool {
        matches!(self, ToolError::Invalid(_) | ToolError::WrongAction(..))
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ActionKind;

    /// Name recorded in the audit trail.
    fn name(&self) -> &'static str;

    fn validate(&self, args: &Value) -> Result<AgentAction, ValidationError> {
        AgentAction::from_parts(self.kind(), args)
    }

    /// Run a validated action; the result is the text handed back to the model.
    async fn invoke(&self, page: &dyn BrowserDriver, action: &AgentAction)
        -> Result<String, ToolError>;
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<ActionKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `navigate`, `type`, `click` and `extract`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NavigateTool));
        registry.register(Arc::new(TypeTool));
        registry.register(Arc::new(ClickTool));
        registry.register(Arc::new(ExtractTool));
        registry
    }

    /// Insert `tool`, replacing any tool already bound to its kind.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        self.tools.insert(tool.kind(), tool)
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|k| self.tools.contains_key(k))
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
