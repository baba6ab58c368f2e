use crate::traits::{ChatMessage, LlmClient, LlmResponse, Prompt, Sampling};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sherpa_common::{Result, SherpaError};
use sherpa_http::{HttpClient, RequestOpts};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
    sampling: Sampling,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let ollama_client = Self::unchecked(&base_url, model)?;

        ollama_client.probe_server().await?;
        ollama_client.ensure_model_available().await?;

        Ok(ollama_client)
    }

    /// Create a client without contacting the server.
    pub fn unchecked(base_url: &str, model: String) -> Result<Self> {
        let client = HttpClient::new(base_url)
            .map_err(|e| SherpaError::Agent(format!("Failed to create HTTP client: {e}")))?
            .with_timeout(Duration::from_secs(120));
        Ok(Self {
            client,
            model,
            sampling: Sampling {
                temperature: Some(0.2),
                max_tokens: None,
            },
        })
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    async fn probe_server(&self) -> Result<()> {
        self.fetch_available_models()
            .await
            .map(|_| ())
            .map_err(|_| SherpaError::Agent(OLLAMA_CONNECTION_ERROR.to_string()))
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;

        if !models.contains(&self.model) {
            tracing::info!("Model {} not found locally, pulling...", self.model);
            self.pull_model().await?;
        }

        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self
            .client
            .get_json(
                "api/tags",
                RequestOpts {
                    timeout: Some(Duration::from_secs(10)),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SherpaError::Agent(format!("Failed to fetch models: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self) -> Result<()> {
        let payload = json!({ "model": self.model, "stream": false });
        let opts = RequestOpts {
            timeout: Some(Duration::from_secs(600)),
            retries: Some(0),
            ..Default::default()
        };
        self.client
            .post_json_opts::<_, serde_json::Value>("api/pull", &payload, opts)
            .await
            .map_err(|e| SherpaError::Agent(format!("Failed to pull model: {e}")))?;
        tracing::info!("Successfully pulled model: {}", self.model);
        Ok(())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn invoke(&self, prompt: Prompt) -> Result<LlmResponse> {
        let messages = prompt.into_messages();

        let mut options = serde_json::Map::new();
        if let Some(temp) = self.sampling.temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = self.sampling.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let req = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: false,
            options: serde_json::Value::Object(options),
        };

        let resp: ChatResponse = self
            .client
            .post_json("api/chat", None, &req)
            .await
            .map_err(|e| SherpaError::Llm(format!("Generate request failed: {e}")))?;

        Ok(LlmResponse {
            text: resp.message.map(|m| m.content).unwrap_or_default(),
            model: Some(self.model.clone()),
            tokens_used: resp.eval_count,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        self.probe_server().await.map(|_| true).or(Ok(false))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
