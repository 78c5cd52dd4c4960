pub mod ollama;
pub mod openai;

#[cfg(test)]
pub(crate) mod mock;

pub use ollama::*;
pub use openai::*;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ProviderBackend, ProviderDescriptor};
use crate::models::ProviderErrorKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Provider misconfigured: {0}")]
    Misconfigured(String),
}

/// What the fallback walk does after a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient; try the same variant again after backoff.
    Retry,
    /// Try the next, cheaper variant of the same provider.
    Degrade,
    /// Abandon this provider entirely.
    SkipProvider,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::RateLimited(_) => ProviderErrorKind::RateLimited,
            Self::Unauthorized(_) => ProviderErrorKind::Unauthorized,
            Self::Timeout(_) => ProviderErrorKind::Timeout,
            Self::ServiceUnavailable(_) => ProviderErrorKind::ServiceUnavailable,
            Self::Malformed(_) => ProviderErrorKind::Malformed,
            Self::Misconfigured(_) => ProviderErrorKind::Misconfigured,
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            Self::RateLimited(_) | Self::Timeout(_) | Self::ServiceUnavailable(_) => {
                Disposition::Retry
            }
            Self::Malformed(_) => Disposition::Degrade,
            Self::Unauthorized(_) | Self::Misconfigured(_) => Disposition::SkipProvider,
        }
    }

    /// Map a non-success HTTP status onto the provider taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), snippet(body));
        match status.as_u16() {
            401 | 403 => Self::Unauthorized(detail),
            429 => Self::RateLimited(detail),
            408 | 504 => Self::Timeout(detail),
            500..=599 => Self::ServiceUnavailable(detail),
            _ => Self::Malformed(detail),
        }
    }

    /// Map a transport-level failure.
    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::ServiceUnavailable(format!("connection failed: {e}"))
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::ServiceUnavailable(e.to_string())
        }
    }
}

/// Keep error bodies short enough for logs and attempt trails.
fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Generative-analysis capability: prompt in, free-form text out.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn generate(&self, variant: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Build the HTTP backend a descriptor names.
pub fn build_provider(
    descriptor: &ProviderDescriptor,
) -> Result<Arc<dyn AnalysisProvider>, ProviderError> {
    match descriptor.backend {
        ProviderBackend::Openai => Ok(Arc::new(OpenAiProvider::from_descriptor(descriptor)?)),
        ProviderBackend::Ollama => Ok(Arc::new(OllamaProvider::from_descriptor(descriptor)?)),
    }
}
