//! The record threaded through every workflow transition.

use crate::action::{ActionRecord, PendingAction, StepRecord};
use crate::output::RunOutput;
use crate::platform::SearchPhase;
use crate::tools::ToolRegistry;
use serde::Serialize;
use sherpa_drivers::BrowserDriver;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Node {
    Start,
    Plan,
    AnalyzePage,
    ExtractInfo,
    TakeAction,
    CheckCompletion,
    ErrorHandling,
    End,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Node::Start => "start",
            Node::Plan => "plan",
            Node::AnalyzePage => "analyzePage",
            Node::ExtractInfo => "extractInfo",
            Node::TakeAction => "takeAction",
            Node::CheckCompletion => "checkCompletion",
            Node::ErrorHandling => "errorHandling",
            Node::End => "end",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The model's reply could not be decoded into the expected shape.
    MalformedOutput,
    /// A tool, the browser or the model provider failed.
    Tool,
    /// Arguments or an action choice were rejected.
    Policy,
    /// A run ceiling was hit. Never retried.
    SafetyLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentError {
    pub kind: ErrorKind,
    pub message: String,
    /// Node to resume instead of `last_node`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_at: Option<Node>,
}

impl AgentError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resume_at: None,
        }
    }

    pub fn resume_at(mut self, node: Node) -> Self {
        self.resume_at = Some(node);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::SafetyLimit
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Mutable state of one run. Nodes only read it; the controller applies
/// their [`ContextUpdate`]s.
pub struct Context {
    pub run_id: Uuid,
    pub task: String,
    pub refined_query: Option<String>,
    pub plan: Option<String>,
    pub page: Box<dyn BrowserDriver>,
    pub tools: ToolRegistry,
    pub actions_taken: Vec<ActionRecord>,
    pub steps: Vec<StepRecord>,
    pub step_count: u32,
    pub retry_count: u32,
    pub nav_loop_count: u32,
    pub last_nav_target: Option<String>,
    pub error: Option<AgentError>,
    pub final_result: Option<String>,
    pub next_node: Option<Node>,
    pub last_node: Option<Node>,
    pub pending_action: Option<PendingAction>,
    pub page_content: Option<String>,
    pub extracted: Vec<String>,
    pub search_phase: SearchPhase,
    pub errors: Vec<String>,
    pub sources: Vec<String>,
    /// Every node dispatched, in order.
    pub trace: Vec<Node>,
    pub output: Option<RunOutput>,
    pub done: bool,
    pub started_at: Instant,
}

impl Context {
    pub fn new(task: impl Into<String>, page: Box<dyn BrowserDriver>, tools: ToolRegistry) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task: task.into(),
            refined_query: None,
            plan: None,
            page,
            tools,
            actions_taken: Vec::new(),
            steps: Vec::new(),
            step_count: 0,
            retry_count: 0,
            nav_loop_count: 0,
            last_nav_target: None,
            error: None,
            final_result: None,
            next_node: Some(Node::Start),
            last_node: None,
            pending_action: None,
            page_content: None,
            extracted: Vec::new(),
            search_phase: SearchPhase::default(),
            errors: Vec::new(),
            sources: Vec::new(),
            trace: Vec::new(),
            output: None,
            done: false,
            started_at: Instant::now(),
        }
    }

    /// The query forced sequences type: the refined query, else the task.
    pub fn query(&self) -> &str {
        self.refined_query.as_deref().unwrap_or(&self.task)
    }

    pub fn recent_actions(&self, n: usize) -> &[ActionRecord] {
        let start = self.actions_taken.len().saturating_sub(n);
        &self.actions_taken[start..]
    }

    /// Merge a node's partial update. `next_node` is always replaced.
    pub fn apply(&mut self, update: ContextUpdate) {
        let ContextUpdate {
            next_node,
            refined_query,
            plan,
            step_count,
            retry_count,
            nav_loop_count,
            last_nav_target,
            error,
            clear_error,
            final_result,
            pending_action,
            page_content,
            search_phase,
            actions,
            steps,
            extracted,
            sources,
            output,
            done,
        } = update;

        self.next_node = next_node;
        if refined_query.is_some() {
            self.refined_query = refined_query;
        }
        if plan.is_some() {
            self.plan = plan;
        }
        if let Some(n) = step_count {
            self.step_count = n;
        }
        if let Some(n) = retry_count {
            self.retry_count = n;
        }
        if let Some(n) = nav_loop_count {
            self.nav_loop_count = n;
        }
        if last_nav_target.is_some() {
            self.last_nav_target = last_nav_target;
        }
        if clear_error {
            self.error = None;
        }
        if let Some(err) = error {
            self.errors.push(err.to_string());
            self.error = Some(err);
        }
        if final_result.is_some() {
            self.final_result = final_result;
        }
        if pending_action.is_some() {
            self.pending_action = pending_action;
        }
        if page_content.is_some() {
            self.page_content = page_content;
        }
        if let Some(phase) = search_phase {
            self.search_phase = phase;
        }
        self.actions_taken.extend(actions);
        self.steps.extend(steps);
        self.extracted.extend(extracted);
        for url in sources {
            if !self.sources.contains(&url) {
                self.sources.push(url);
            }
        }
        if output.is_some() {
            self.output = output;
        }
        self.done |= done;
    }
}

/// Partial update returned by a node.
#[derive(Debug, Default)]
pub struct ContextUpdate {
    /// `None` ends the run gracefully.
    pub next_node: Option<Node>,
    pub refined_query: Option<String>,
    pub plan: Option<String>,
    pub step_count: Option<u32>,
    pub retry_count: Option<u32>,
    pub nav_loop_count: Option<u32>,
    pub last_nav_target: Option<String>,
    pub error: Option<AgentError>,
    pub clear_error: bool,
    pub final_result: Option<String>,
    pub pending_action: Option<PendingAction>,
    pub page_content: Option<String>,
    pub search_phase: Option<SearchPhase>,
    pub actions: Vec<ActionRecord>,
    pub steps: Vec<StepRecord>,
    pub extracted: Vec<String>,
    pub sources: Vec<String>,
    pub output: Option<RunOutput>,
    pub done: bool,
}

impl ContextUpdate {
    pub fn to(node: Node) -> Self {
        Self {
            next_node: Some(node),
            ..Default::default()
        }
    }

    /// Route to `errorHandling` carrying `error`.
    pub fn fail(error: AgentError) -> Self {
        Self {
            next_node: Some(Node::ErrorHandling),
            error: Some(error),
            ..Default::default()
        }
    }
}
