use crate::traits::{ChatMessage, LlmClient, LlmResponse, Prompt, Sampling};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sherpa_common::{Result, SherpaError};
use sherpa_http::{HttpClient, HttpError};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

/// Client for the OpenAI chat completions API (or any compatible gateway).
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
    sampling: Sampling,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a client for `model`; `base_url` defaults to the public API.
    pub fn new(api_key: String, model: String, base_url: Option<&str>) -> Result<Self> {
        let base = normalize_base(base_url.unwrap_or(OPENAI_API_BASE));
        let client = HttpClient::new(&base)
            .map_err(|e| SherpaError::Agent(format!("HttpClient init failed: {e}")))?;

        Ok(Self {
            client,
            api_key,
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
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn normalize_base(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn invoke(&self, prompt: Prompt) -> Result<LlmResponse> {
        let messages = prompt.into_messages();
        let req = ChatCompletionRequest {
            model: &self.model,
            messages: &messages,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
        };

        tracing::debug!(
            target: "llm.openai",
            model = %self.model,
            turns = messages.len(),
            "llm.invoke.start"
        );

        let resp: ChatCompletionResponse = self
            .client
            .post_json("chat/completions", Some(&self.api_key), &req)
            .await
            .map_err(http_to_sherpa)?;

        let text = resp
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .unwrap_or_default();

        Ok(LlmResponse {
            text,
            model: resp.model.or_else(|| Some(self.model.clone())),
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        match self.invoke(Prompt::from("Respond with just 'OK'")).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("OpenAi health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

fn http_to_sherpa(e: HttpError) -> SherpaError {
    SherpaError::Llm(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_gets_trailing_slash() {
        assert_eq!(normalize_base("http://x/v1"), "http://x/v1/");
        assert_eq!(normalize_base("http://x/v1/"), "http://x/v1/");
    }
}
