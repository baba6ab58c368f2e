//! The decision/execution loop.
//!
//! Each node is an async function from `&Context` to a [`ContextUpdate`].
//! [`Workflow::execute`] merges every update and dispatches the node it names
//! until a node names none. Nodes never panic and never return errors; a
//! failure is an update that routes to `errorHandling`.

use crate::action::{
    coerce_arguments, ActionKind, ActionRecord, AgentAction, PendingAction, RawDecision,
    StepRecord,
};
use crate::context::{AgentError, Context, ContextUpdate, ErrorKind, Node};
use crate::output::{RunMetadata, RunOutput, ERROR_PREFIX};
use crate::platform::PlatformStrategy;
use crate::prompts;
use crate::retry::{recover, Recovery};
use crate::tools::ToolRegistry;
use serde::Deserialize;
use serde_json::json;
use sherpa_common::observability::run_span;
use sherpa_common::{preview, AgentLimits};
use sherpa_drivers::BrowserDriver;
use sherpa_llm::decode::decode_json;
use sherpa_llm::traits::Prompt;
use sherpa_llm::SharedLlm;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use url::Url;

#[derive(Debug, Deserialize)]
struct PlanReply {
    #[serde(default)]
    steps: Vec<String>,
    #[serde(default)]
    refined_query: Option<String>,
}

pub struct Workflow {
    llm: SharedLlm,
    limits: AgentLimits,
    target_url: Option<String>,
    strategies: Vec<Arc<dyn PlatformStrategy>>,
}

impl Workflow {
    pub fn new(llm: SharedLlm) -> Self {
        Self {
            llm,
            limits: AgentLimits::default(),
            target_url: None,
            strategies: Vec::new(),
        }
    }

    pub fn with_limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Once the page is on `url`, `navigate` leaves the vocabulary.
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn PlatformStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn limits(&self) -> &AgentLimits {
        &self.limits
    }

    /// Run `task` on `page` to completion and close the page.
    pub async fn run(
        &self,
        task: &str,
        page: Box<dyn BrowserDriver>,
        tools: ToolRegistry,
    ) -> RunOutput {
        let ctx = self.execute(Context::new(task, page, tools)).await;
        if let Err(e) = ctx.page.close().await {
            warn!(target: "agent.workflow", error = %e, "closing page failed");
        }
        match ctx.output {
            Some(ref output) => output.clone(),
            None => self.build_output(&ctx),
        }
    }

    /// Drive `ctx` until no next node remains.
    pub async fn execute(&self, mut ctx: Context) -> Context {
        let span = run_span("workflow", &ctx.run_id.to_string(), &ctx.task);
        async move {
            while let Some(node) = ctx.next_node {
                if node != Node::ErrorHandling {
                    ctx.last_node = Some(node);
                }
                ctx.trace.push(node);
                debug!(
                    target: "agent.workflow",
                    node = %node,
                    step_count = ctx.step_count,
                    retry_count = ctx.retry_count,
                    "workflow.node.enter"
                );
                let update = self.dispatch(node, &ctx).await;
                ctx.apply(update);
                if ctx.done {
                    break;
                }
            }
            ctx
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, node: Node, ctx: &Context) -> ContextUpdate {
        match node {
            Node::Start => self.start(ctx),
            Node::Plan => self.plan(ctx).await,
            Node::AnalyzePage => self.analyze_page(ctx).await,
            Node::ExtractInfo => self.extract_info(ctx).await,
            Node::TakeAction => self.take_action(ctx).await,
            Node::CheckCompletion => self.check_completion(ctx).await,
            Node::ErrorHandling => self.error_handling(ctx),
            Node::End => self.end(ctx),
        }
    }

    async fn ask(&self, prompt: Prompt) -> Result<String, AgentError> {
        self.llm
            .invoke(prompt)
            .await
            .map(|r| r.text)
            .map_err(|e| AgentError::new(ErrorKind::Tool, format!("model call failed: {e}")))
    }

    fn start(&self, ctx: &Context) -> ContextUpdate {
        info!(target: "agent.workflow", task = %ctx.task, "workflow.start");
        ContextUpdate::to(Node::Plan)
    }

    async fn plan(&self, ctx: &Context) -> ContextUpdate {
        let mut update = ContextUpdate::to(Node::ExtractInfo);
        let raw = match self.ask(prompts::plan(&ctx.task)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "agent.workflow", error = %e, "planning failed; continuing with the task as query");
                update.refined_query = Some(ctx.task.clone());
                return update;
            }
        };

        match decode_json::<PlanReply>(&raw) {
            Ok(reply) if !reply.steps.is_empty() || reply.refined_query.is_some() => {
                update.plan = Some(reply.steps.join("\n"));
                update.refined_query = Some(
                    reply
                        .refined_query
                        .filter(|q| !q.trim().is_empty())
                        .unwrap_or_else(|| ctx.task.clone()),
                );
            }
            _ => {
                debug!(target: "agent.workflow", "plan reply not structured; keeping raw text");
                update.plan = Some(raw);
                update.refined_query = Some(ctx.task.clone());
            }
        }
        info!(
            target: "agent.workflow",
            refined_query = update.refined_query.as_deref().unwrap_or_default(),
            "workflow.plan"
        );
        update
    }

    fn allowed_actions(&self, current_url: &str) -> Vec<ActionKind> {
        let on_target = self
            .target_url
            .as_deref()
            .is_some_and(|t| urls_match(current_url, t));
        ActionKind::ALL
            .into_iter()
            .filter(|k| !(on_target && *k == ActionKind::Navigate))
            .collect()
    }

    async fn analyze_page(&self, ctx: &Context) -> ContextUpdate {
        let page = ctx.page.as_ref();
        let (url, content) = match (page.current_url().await, page.content().await) {
            (Ok(u), Ok(c)) => (u, c),
            (Err(e), _) | (_, Err(e)) => {
                return ContextUpdate::fail(AgentError::new(ErrorKind::Tool, e.to_string()))
            }
        };
        let allowed = self.allowed_actions(&url);
        let prompt = prompts::analyze_page(
            &ctx.task,
            &url,
            &allowed,
            ctx.recent_actions(self.limits.history_window),
            preview(&content, self.limits.content_preview_chars),
        );
        let raw = match self.ask(prompt).await {
            Ok(text) => text,
            Err(e) => return ContextUpdate::fail(e),
        };
        let decision = match RawDecision::from_reply(&raw) {
            Ok(d) => d,
            Err(e) => {
                return ContextUpdate::fail(AgentError::new(
                    ErrorKind::MalformedOutput,
                    format!("{e}; raw output: {raw}"),
                ))
            }
        };

        let pending = match ActionKind::parse(&decision.action).filter(|k| allowed.contains(k)) {
            Some(kind) => {
                let arguments = coerce_arguments(kind, decision.arguments);
                if let Some(tool) = ctx.tools.get(kind) {
                    if let Err(e) = tool.validate(&arguments) {
                        return ContextUpdate::fail(
                            AgentError::new(ErrorKind::Policy, format!("{e}; raw output: {raw}"))
                                .resume_at(Node::AnalyzePage),
                        );
                    }
                }
                PendingAction { kind, arguments }
            }
            None => {
                let kind = substitute(&allowed);
                warn!(
                    target: "agent.workflow",
                    requested = %decision.action,
                    substitute = %kind,
                    "action outside vocabulary; substituting"
                );
                PendingAction {
                    kind,
                    arguments: json!({}),
                }
            }
        };

        ContextUpdate {
            pending_action: Some(pending),
            page_content: Some(content),
            ..ContextUpdate::to(Node::TakeAction)
        }
    }

    async fn extract_info(&self, ctx: &Context) -> ContextUpdate {
        if ctx.step_count >= self.limits.max_steps {
            return ContextUpdate::fail(AgentError::new(
                ErrorKind::SafetyLimit,
                format!(
                    "step limit of {} reached; the run looks like an infinite loop",
                    self.limits.max_steps
                ),
            ));
        }

        let page = ctx.page.as_ref();
        let url = match page.current_url().await {
            Ok(u) => u,
            Err(e) => return ContextUpdate::fail(AgentError::new(ErrorKind::Tool, e.to_string())),
        };

        if let Some(strategy) = self
            .strategies
            .iter()
            .find(|s| s.detect(&url, ctx.search_phase))
        {
            return self.forced_step(strategy.as_ref(), ctx).await;
        }

        let content = match page.content().await {
            Ok(c) => c,
            Err(e) => return ContextUpdate::fail(AgentError::new(ErrorKind::Tool, e.to_string())),
        };
        let prompt = prompts::extract_info(
            &ctx.task,
            ctx.query(),
            &url,
            ctx.recent_actions(self.limits.history_window),
            preview(&content, self.limits.content_preview_chars),
        );
        let raw = match self.ask(prompt).await {
            Ok(text) => text,
            Err(e) => return ContextUpdate::fail(e),
        };
        let decision = match RawDecision::from_reply(&raw) {
            Ok(d) => d,
            Err(e) => {
                return ContextUpdate::fail(AgentError::new(
                    ErrorKind::MalformedOutput,
                    format!("{e}; raw output: {raw}"),
                ))
            }
        };
        let Some(kind) = ActionKind::parse(&decision.action) else {
            return ContextUpdate::fail(AgentError::new(
                ErrorKind::MalformedOutput,
                format!("unknown action `{}`", decision.action),
            ));
        };
        let arguments = coerce_arguments(kind, decision.arguments);
        let step_count = Some(ctx.step_count + 1);

        match kind {
            ActionKind::Finish => ContextUpdate {
                step_count,
                page_content: Some(content),
                ..ContextUpdate::to(Node::CheckCompletion)
            },
            ActionKind::Extract => {
                let Some(tool) = ctx.tools.get(kind) else {
                    return ContextUpdate::fail(AgentError::new(
                        ErrorKind::Policy,
                        format!("no tool registered for `{kind}`"),
                    ));
                };
                let action = match tool.validate(&arguments) {
                    Ok(a) => a,
                    Err(e) => {
                        return ContextUpdate::fail(AgentError::new(ErrorKind::Policy, e.to_string()))
                    }
                };
                match tool.invoke(page, &action).await {
                    Ok(text) => {
                        info!(
                            target: "agent.workflow",
                            step = ctx.step_count + 1,
                            chars = text.len(),
                            "workflow.extracted"
                        );
                        ContextUpdate {
                            step_count,
                            retry_count: Some(0),
                            page_content: Some(content),
                            extracted: vec![text.clone()],
                            actions: vec![ActionRecord {
                                action: kind,
                                arguments: arguments.clone(),
                            }],
                            steps: vec![StepRecord {
                                tool: tool.name().to_string(),
                                action: kind,
                                arguments,
                                result: text,
                                format: decision.format.clone(),
                            }],
                            ..ContextUpdate::to(Node::ExtractInfo)
                        }
                    }
                    Err(e) => ContextUpdate::fail(AgentError::new(ErrorKind::Tool, e.to_string())),
                }
            }
            ActionKind::Navigate | ActionKind::Type | ActionKind::Click => ContextUpdate {
                step_count,
                page_content: Some(content),
                pending_action: Some(PendingAction { kind, arguments }),
                ..ContextUpdate::to(Node::TakeAction)
            },
        }
    }

    async fn forced_step(&self, strategy: &dyn PlatformStrategy, ctx: &Context) -> ContextUpdate {
        let forced = strategy.step(ctx).await;
        info!(
            target: "agent.platform",
            strategy = strategy.name(),
            from = ?ctx.search_phase,
            to = ?forced.phase,
            ok = forced.outcome.is_ok(),
            "platform.step"
        );
        match forced.outcome {
            Ok(record) => ContextUpdate {
                step_count: Some(ctx.step_count + 1),
                retry_count: Some(0),
                search_phase: Some(forced.phase),
                extracted: forced.extracted.into_iter().collect(),
                actions: vec![ActionRecord {
                    action: record.action,
                    arguments: record.arguments.clone(),
                }],
                steps: vec![record],
                ..ContextUpdate::to(Node::ExtractInfo)
            },
            Err(reason) => ContextUpdate {
                search_phase: Some(forced.phase),
                ..ContextUpdate::fail(
                    AgentError::new(
                        ErrorKind::Tool,
                        format!("{} sequence: {reason}", strategy.name()),
                    )
                    .resume_at(Node::ExtractInfo),
                )
            },
        }
    }

    async fn take_action(&self, ctx: &Context) -> ContextUpdate {
        let Some(pending) = ctx.pending_action.clone() else {
            return ContextUpdate::fail(
                AgentError::new(ErrorKind::Policy, "no pending action").resume_at(Node::AnalyzePage),
            );
        };
        if pending.kind == ActionKind::Finish {
            return ContextUpdate::to(Node::CheckCompletion);
        }
        let Some(tool) = ctx.tools.get(pending.kind) else {
            return ContextUpdate::fail(
                AgentError::new(
                    ErrorKind::Policy,
                    format!("no tool registered for `{}`", pending.kind),
                )
                .resume_at(Node::AnalyzePage),
            );
        };
        let action = match tool.validate(&pending.arguments) {
            Ok(a) => a,
            Err(e) => {
                return ContextUpdate::fail(
                    AgentError::new(ErrorKind::Policy, e.to_string()).resume_at(Node::AnalyzePage),
                )
            }
        };

        let page = ctx.page.as_ref();
        let mut update = ContextUpdate::default();

        if let AgentAction::Navigate { url } = &action {
            let repeat = ctx
                .last_nav_target
                .as_deref()
                .is_some_and(|last| urls_match(last, url));
            let count = if repeat { ctx.nav_loop_count + 1 } else { 1 };
            if count > self.limits.max_nav_repeats {
                return ContextUpdate::fail(AgentError::new(
                    ErrorKind::SafetyLimit,
                    format!("navigation to {url} attempted {count} times in a row"),
                ));
            }
            update.nav_loop_count = Some(count);
            update.last_nav_target = Some(url.clone());

            match page.current_url().await {
                Ok(current) if urls_match(&current, url) => {
                    info!(target: "agent.workflow", %url, "already on target; skipping navigation");
                    update.next_node = Some(Node::AnalyzePage);
                    return update;
                }
                Ok(_) => {}
                Err(e) => {
                    update.next_node = Some(Node::ErrorHandling);
                    update.error = Some(AgentError::new(ErrorKind::Tool, e.to_string()));
                    return update;
                }
            }
        }

        match tool.invoke(page, &action).await {
            Ok(content) => {
                if let AgentAction::Navigate { url } = &action {
                    let landed = page.current_url().await.unwrap_or_else(|_| url.clone());
                    update.sources.push(landed);
                }
                info!(target: "agent.workflow", tool = tool.name(), "workflow.action.done");
                update.retry_count = Some(0);
                update.actions.push(ActionRecord {
                    action: pending.kind,
                    arguments: pending.arguments.clone(),
                });
                update.steps.push(StepRecord {
                    tool: tool.name().to_string(),
                    action: pending.kind,
                    arguments: pending.arguments,
                    result: preview(&content, self.limits.content_preview_chars).to_string(),
                    format: None,
                });
                update.page_content = Some(content);
                update.next_node = Some(Node::ExtractInfo);
            }
            Err(e) => {
                let error = if e.is_policy() {
                    AgentError::new(ErrorKind::Policy, e.to_string()).resume_at(Node::AnalyzePage)
                } else {
                    AgentError::new(ErrorKind::Tool, e.to_string())
                };
                update.next_node = Some(Node::ErrorHandling);
                update.error = Some(error);
            }
        }
        update
    }

    async fn check_completion(&self, ctx: &Context) -> ContextUpdate {
        let reply = match self
            .ask(prompts::check_completion(&ctx.task, &ctx.extracted))
            .await
        {
            Ok(text) => text,
            Err(e) => return ContextUpdate::fail(e),
        };
        if reply.to_lowercase().contains("yes") {
            info!(target: "agent.workflow", "workflow.complete");
            ContextUpdate {
                final_result: Some(reply),
                ..ContextUpdate::to(Node::End)
            }
        } else {
            debug!(target: "agent.workflow", "task not complete yet");
            ContextUpdate::to(Node::ExtractInfo)
        }
    }

    fn error_handling(&self, ctx: &Context) -> ContextUpdate {
        let attempts = ctx.retry_count + 1;
        let message = ctx
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        warn!(
            target: "agent.workflow",
            error = %message,
            attempts,
            last_node = ?ctx.last_node,
            "workflow.error"
        );
        match recover(ctx.error.as_ref(), attempts, self.limits.max_retries, ctx.last_node) {
            Recovery::Resume(node) => ContextUpdate {
                retry_count: Some(attempts),
                clear_error: true,
                ..ContextUpdate::to(node)
            },
            Recovery::Abort(result) => ContextUpdate {
                retry_count: Some(attempts),
                final_result: Some(result),
                ..ContextUpdate::to(Node::End)
            },
        }
    }

    fn end(&self, ctx: &Context) -> ContextUpdate {
        let output = self.build_output(ctx);
        info!(
            target: "agent.workflow",
            steps = output.steps.len(),
            run_time_ms = output.metadata.run_time_ms,
            failed = output.is_error(),
            "workflow.end"
        );
        ContextUpdate {
            next_node: None,
            output: Some(output),
            done: true,
            ..Default::default()
        }
    }

    fn build_output(&self, ctx: &Context) -> RunOutput {
        let result = match (&ctx.final_result, &ctx.error) {
            (Some(r), _) => r.clone(),
            (None, Some(e)) => format!("{ERROR_PREFIX}{}", e.message),
            (None, None) => "No result produced".to_string(),
        };
        RunOutput {
            task: ctx.task.clone(),
            steps: ctx.steps.clone(),
            result,
            metadata: RunMetadata {
                run_id: ctx.run_id.to_string(),
                run_time_ms: ctx.started_at.elapsed().as_millis() as u64,
                step_count: ctx.step_count,
                sources: ctx.sources.clone(),
                errors: ctx.errors.clone(),
            },
        }
    }
}

/// First preferred substitute still allowed, else the first allowed action.
fn substitute(allowed: &[ActionKind]) -> ActionKind {
    ActionKind::SUBSTITUTES
        .into_iter()
        .find(|k| allowed.contains(k))
        .or_else(|| allowed.first().copied())
        .unwrap_or(ActionKind::Finish)
}

/// Compare URLs after parsing, ignoring fragments and a trailing slash.
pub fn urls_match(a: &str, b: &str) -> bool {
    fn normalise(s: &str) -> String {
        match Url::parse(s.trim()) {
            Ok(mut u) => {
                u.set_fragment(None);
                u.as_str().trim_end_matches('/').to_string()
            }
            Err(_) => s.trim().trim_end_matches('/').to_string(),
        }
    }
    normalise(a) == normalise(b)
}
