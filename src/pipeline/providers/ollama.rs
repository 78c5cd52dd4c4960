use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AnalysisProvider, ProviderError};
use crate::config::ProviderDescriptor;
use crate::pipeline::prompt::REVIEWER_SYSTEM_PROMPT;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama HTTP client for local inference.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
    temperature: f32,
}

impl OllamaProvider {
    pub fn new(base_url: &str, timeout: Duration, temperature: f32) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Misconfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            temperature,
        })
    }

    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self, ProviderError> {
        Self::new(
            &descriptor.base_url,
            descriptor.timeout(),
            descriptor.temperature,
        )
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl AnalysisProvider for OllamaProvider {
    async fn generate(&self, variant: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: variant,
            prompt,
            system: REVIEWER_SYSTEM_PROMPT.trim(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::ServiceUnavailable(format!(
                        "Ollama is not running at {}",
                        self.base_url
                    ))
                } else {
                    ProviderError::from_transport(&e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::Malformed(format!(
                "model {variant} is not available on {}",
                self.base_url
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(parsed.response)
    }
}
