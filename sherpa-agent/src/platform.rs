//! Forced action sequences for sites whose flow is known in advance.
//!
//! While a strategy's detection predicate holds, `extractInfo` asks the
//! strategy for the next step instead of the model.

use crate::action::{ActionKind, AgentAction, StepRecord};
use crate::context::Context;
use crate::tools::{ClickTool, ExtractTool, Tool, TypeTool, SEARCH_INPUT};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use sherpa_drivers::diagnostics::dump_page;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Where a forced search sequence stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SearchPhase {
    #[default]
    TypeQuery,
    Submit,
    AwaitResults,
    ExtractResults,
    Complete,
    /// A step failed; the model drives from here on.
    Abandoned,
}

impl SearchPhase {
    pub fn is_active(&self) -> bool {
        !matches!(self, SearchPhase::Complete | SearchPhase::Abandoned)
    }
}

/// Result of one forced step.
#[derive(Debug)]
pub struct ForcedStep {
    /// Phase to record after this step.
    pub phase: SearchPhase,
    pub outcome: Result<StepRecord, String>,
    pub extracted: Option<String>,
}

impl ForcedStep {
    fn ok(phase: SearchPhase, record: StepRecord) -> Self {
        Self {
            phase,
            outcome: Ok(record),
            extracted: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            phase: SearchPhase::Abandoned,
            outcome: Err(reason.into()),
            extracted: None,
        }
    }
}

#[async_trait]
pub trait PlatformStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, current_url: &str, phase: SearchPhase) -> bool;

    async fn step(&self, ctx: &Context) -> ForcedStep;
}

/// Type query, submit, wait for the results container, extract results.
pub struct SearchPlatform {
    pub hosts: Vec<String>,
    pub input_selector: String,
    pub submit_selector: String,
    pub results_selector: String,
    pub results_wait: Duration,
    /// Page dumps land here when the results container never appears.
    pub dump_dir: Option<PathBuf>,
}

impl Default for SearchPlatform {
    fn default() -> Self {
        Self {
            hosts: vec![
                "google.".to_string(),
                "bing.com".to_string(),
                "duckduckgo.com".to_string(),
            ],
            input_selector: SEARCH_INPUT.to_string(),
            submit_selector: "button[type=\"submit\"], input[type=\"submit\"]".to_string(),
            results_selector: "#search, #b_results, #links, .results".to_string(),
            results_wait: Duration::from_secs(10),
            dump_dir: None,
        }
    }
}

impl SearchPlatform {
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    fn record(tool: &str, action: ActionKind, arguments: serde_json::Value, result: &str) -> StepRecord {
        StepRecord {
            tool: tool.to_string(),
            action,
            arguments,
            result: result.to_string(),
            format: None,
        }
    }

    async fn type_query(&self, ctx: &Context) -> ForcedStep {
        let action = AgentAction::Type {
            selector: self.input_selector.clone(),
            text: ctx.query().to_string(),
        };
        match TypeTool.invoke(ctx.page.as_ref(), &action).await {
            Ok(_) => ForcedStep::ok(
                SearchPhase::Submit,
                Self::record(
                    TypeTool.name(),
                    ActionKind::Type,
                    json!({"selector": self.input_selector, "text": ctx.query()}),
                    "typed query",
                ),
            ),
            Err(e) => ForcedStep::failed(e.to_string()),
        }
    }

    async fn submit(&self, ctx: &Context) -> ForcedStep {
        let action = AgentAction::Click {
            selector: self.submit_selector.clone(),
        };
        match ClickTool.invoke(ctx.page.as_ref(), &action).await {
            Ok(_) => ForcedStep::ok(
                SearchPhase::AwaitResults,
                Self::record(
                    ClickTool.name(),
                    ActionKind::Click,
                    json!({"selector": self.submit_selector}),
                    "submitted search",
                ),
            ),
            Err(e) => ForcedStep::failed(e.to_string()),
        }
    }

    async fn await_results(&self, ctx: &Context) -> ForcedStep {
        let page = ctx.page.as_ref();
        match page
            .wait_for_selector(&self.results_selector, self.results_wait)
            .await
        {
            Ok(()) => ForcedStep::ok(
                SearchPhase::ExtractResults,
                Self::record(
                    "wait_for_selector",
                    ActionKind::Extract,
                    json!({"selector": self.results_selector}),
                    "results visible",
                ),
            ),
            Err(e) => {
                if let Some(dir) = &self.dump_dir {
                    match dump_page(page, dir, "search-results").await {
                        Ok(paths) => {
                            info!(target: "agent.platform", html = %paths.html.display(), "results container missing; page dumped")
                        }
                        Err(dump_err) => {
                            warn!(target: "agent.platform", error = %dump_err, "page dump failed")
                        }
                    }
                }
                ForcedStep::failed(format!("results container never appeared: {e}"))
            }
        }
    }

    async fn extract_results(&self, ctx: &Context) -> ForcedStep {
        let action = AgentAction::Extract {
            selector: self.results_selector.clone(),
            index: 0,
        };
        match ExtractTool.invoke(ctx.page.as_ref(), &action).await {
            Ok(text) => {
                let mut step = ForcedStep::ok(
                    SearchPhase::Complete,
                    Self::record(
                        ExtractTool.name(),
                        ActionKind::Extract,
                        json!({"selector": self.results_selector}),
                        &text,
                    ),
                );
                step.extracted = Some(text);
                step
            }
            Err(e) => ForcedStep::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl PlatformStrategy for SearchPlatform {
    fn name(&self) -> &'static str {
        "search"
    }

    fn detect(&self, current_url: &str, phase: SearchPhase) -> bool {
        if !phase.is_active() {
            return false;
        }
        let Some(host) = Url::parse(current_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            return false;
        };
        self.hosts.iter().any(|h| host.contains(h.as_str()))
    }

    async fn step(&self, ctx: &Context) -> ForcedStep {
        match ctx.search_phase {
            SearchPhase::TypeQuery => self.type_query(ctx).await,
            SearchPhase::Submit => self.submit(ctx).await,
            SearchPhase::AwaitResults => self.await_results(ctx).await,
            SearchPhase::ExtractResults => self.extract_results(ctx).await,
            SearchPhase::Complete | SearchPhase::Abandoned => {
                ForcedStep::failed("search sequence already finished")
            }
        }
    }
}
