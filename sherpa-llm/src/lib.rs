//! Provider‑agnostic LLM integration for Sherpa.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, concrete
//! provider implementations for Ollama and OpenAI, and the [`decode`] step
//! that recovers JSON from free-text replies.
//!
//! # Examples
//! ```no_run
//! use sherpa_common::{LlmConfig, Result};
//! use sherpa_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = LlmConfig::default();
//! let client = ensure_llm_ready(&cfg).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod decode;
pub mod ollama;
pub mod openai;
pub mod traits;

use ollama::OllamaClient;
use openai::OpenAiClient;
use sherpa_common::{LlmConfig, SherpaError};
use std::sync::Arc;
use traits::{LlmClient, Sampling};

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Shared handle to whichever provider the configuration selected.
pub type SharedLlm = Arc<dyn LlmClient + Send + Sync + 'static>;

/// Build the configured client, making sure it is reachable.
pub async fn ensure_llm_ready(config: &LlmConfig) -> sherpa_common::Result<SharedLlm> {
    ensure_llm_ready_with(config, None).await
}

/// Like [`ensure_llm_ready`], overriding the provider's default sampling.
pub async fn ensure_llm_ready_with(
    config: &LlmConfig,
    sampling: Option<Sampling>,
) -> sherpa_common::Result<SharedLlm> {
    match config {
        #[cfg(feature = "ollama")]
        LlmConfig::Ollama { base_url, model } => {
            let mut client = OllamaClient::new(base_url.clone(), model.clone()).await?;
            if let Some(s) = sampling {
                client = client.with_sampling(s);
            }
            Ok(Arc::new(client))
        }
        #[cfg(feature = "openai")]
        LlmConfig::OpenAi {
            api_key,
            model,
            base_url,
        } => {
            let mut client =
                OpenAiClient::new(api_key.clone(), model.clone(), base_url.as_deref())?;
            if let Some(s) = sampling {
                client = client.with_sampling(s);
            }
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(SherpaError::Config("No LLM configured".to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(SherpaError::Config("LLM provider not enabled".to_string())),
    }
}
