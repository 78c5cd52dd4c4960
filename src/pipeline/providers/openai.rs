use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AnalysisProvider, ProviderError};
use crate::config::ProviderDescriptor;
use crate::pipeline::prompt::REVIEWER_SYSTEM_PROMPT;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    /// Resolved at construction; a missing key surfaces per call as `Misconfigured`.
    api_key: Option<String>,
    api_key_env: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        api_key_env: &str,
        timeout: Duration,
        temperature: f32,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Misconfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_key_env: api_key_env.to_string(),
            temperature,
        })
    }

    /// Build from a descriptor, reading the key from its `api_key_env`.
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self, ProviderError> {
        let env = descriptor
            .api_key_env
            .clone()
            .unwrap_or_else(|| "OPENAI_API_KEY".to_string());
        let api_key = std::env::var(&env).ok();
        Self::new(
            &descriptor.base_url,
            api_key,
            &env,
            descriptor.timeout(),
            descriptor.temperature,
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// First choice's content, rejecting shapes without one.
fn reply_text(response: ChatResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Malformed("response has no message content".into()))
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    async fn generate(&self, variant: &str, prompt: &str) -> Result<String, ProviderError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProviderError::Misconfigured(format!(
                "API key env var {} is not set",
                self.api_key_env
            )));
        };

        let body = ChatRequest {
            model: variant,
            messages: [
                ChatMessage {
                    role: "system",
                    content: REVIEWER_SYSTEM_PROMPT.trim(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        reply_text(parsed)
    }
}
