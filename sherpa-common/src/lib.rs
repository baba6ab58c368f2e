//! Common types and utilities shared across Sherpa crates.
//!
//! This crate defines the shared error type, provider configuration, the
//! safety limits of the workflow engine, and the observability helpers used by
//! every binary and integration test. It is intentionally lightweight so that
//! all crates can depend on it.
//!
//! # Overview
//!
//! - [`LlmConfig`]: Provider‑agnostic LLM configuration
//! - [`AgentLimits`]: Step, retry and navigation ceilings of a workflow run
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`SherpaError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use sherpa_common::AgentLimits;
//!
//! let limits = AgentLimits::default();
//! assert_eq!(limits.max_steps, 20);
//! assert_eq!(limits.max_retries, 3);
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Configuration for an LLM provider used by the workflow and the pipeline.
///
/// Feature flags control which variants are compiled in.
/// See the `sherpa-llm` crate for concrete client implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmConfig {
    #[cfg(feature = "ollama")]
    Ollama { base_url: String, model: String },
    #[cfg(feature = "openai")]
    OpenAi {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    None,
}

impl Default for LlmConfig {
    fn default() -> Self {
        #[cfg(feature = "ollama")]
        {
            Self::Ollama {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
            }
        }
        #[cfg(not(feature = "ollama"))]
        {
            Self::None
        }
    }
}

/// Hard ceilings that bound a single workflow run.
///
/// Every ceiling is a cooperative self-limit: the workflow checks them itself
/// and terminates through its `end` state rather than being cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentLimits {
    /// `step_count` value at which the run fails closed.
    pub max_steps: u32,
    /// Number of `errorHandling` passes after which the run is abandoned.
    pub max_retries: u32,
    /// Repeated navigations of the same pattern tolerated before aborting.
    pub max_nav_repeats: u32,
    /// How many recent actions are shown to the model.
    pub history_window: usize,
    /// How many characters of page content are embedded in prompts.
    pub content_preview_chars: usize,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_retries: 3,
            max_nav_repeats: 3,
            history_window: 2,
            content_preview_chars: 500,
        }
    }
}

/// Error types used across the Sherpa system.
#[derive(thiserror::Error, Debug)]
pub enum SherpaError {
    /// An agent failed to complete a requested operation.
    #[error("Agent error: {0}")]
    Agent(String),

    /// A driver (browser, network, etc.) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// The language model provider failed or returned nothing usable.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`SherpaError`].
pub type Result<T> = std::result::Result<T, SherpaError>;

/// Truncate `text` to at most `max_chars` characters without splitting a
/// UTF‑8 code point.
///
/// ```
/// assert_eq!(sherpa_common::preview("héllo world", 5), "héllo");
/// assert_eq!(sherpa_common::preview("short", 50), "short");
/// ```
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
