//! Autonomous browser task execution.
//!
//! A [`Workflow`] asks a language model for the next browser action, runs it
//! through the [`tools::ToolRegistry`], gathers text and asks whether the task
//! is done, looping until success, a terminal error or a safety ceiling.
//!
//! # Examples
//! ```no_run
//! use sherpa_agent::{tools::ToolRegistry, Workflow};
//! use sherpa_common::LlmConfig;
//! use sherpa_drivers::{PageFactory, WebDriverFactory};
//! use sherpa_drivers::launch::LaunchOptions;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let llm = sherpa_llm::ensure_llm_ready(&LlmConfig::default()).await?;
//! let page = WebDriverFactory::new("http://localhost:9515", LaunchOptions::default())
//!     .open()
//!     .await?;
//! let output = Workflow::new(llm)
//!     .run("find the latest Rust release", page, ToolRegistry::with_defaults())
//!     .await;
//! println!("{}", output.result);
//! # Ok(())
//! # }
//! ```
pub mod action;
pub mod context;
pub mod output;
pub mod platform;
pub mod prompts;
pub mod retry;
pub mod selector;
pub mod tools;
pub mod workflow;

pub use action::{ActionKind, AgentAction};
pub use context::{AgentError, Context, ErrorKind, Node};
pub use output::RunOutput;
pub use workflow::Workflow;
