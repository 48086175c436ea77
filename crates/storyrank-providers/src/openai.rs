//! OpenAI-compatible chat-completions client

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::traits::ProviderResult;
use crate::{GenerationClient, GenerationRequest, ProviderConfig, ProviderError};

/// Chat-completions client shared by every backend that speaks the OpenAI
/// wire format (OpenAI itself, Groq, ...).
pub struct OpenAICompatibleClient {
    client: Client,
    config: ProviderConfig,
}

impl OpenAICompatibleClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.backends.is_empty() {
            return Err(ProviderError::Configuration(
                "at least one backend must be configured".into(),
            ));
        }

        let timeout = Duration::from_secs(config.timeout_seconds());
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_request<'a>(&self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl GenerationClient for OpenAICompatibleClient {
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let backend = self.config.route(&request.model)?;
        let api_key = backend.credentials.pick().ok_or_else(|| {
            ProviderError::Configuration(format!(
                "no credentials configured for backend '{}'",
                backend.name
            ))
        })?;

        debug!(
            backend = %backend.name,
            model = %request.model,
            messages = request.messages.len(),
            estimated_tokens = request
                .messages
                .iter()
                .map(|m| m.estimate_tokens())
                .sum::<usize>(),
            "Sending generation request"
        );

        let response = self
            .client
            .post(&backend.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&self.build_request(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                backend = %backend.name,
                status = status.as_u16(),
                "Generation backend returned an error"
            );
            return Err(ProviderError::Upstream {
                backend: backend.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing choices[0].message.content".into())
            })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

// API request/response types
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
