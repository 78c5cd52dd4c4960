//! Scripted providers for exercising the fallback walk without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{AnalysisProvider, ProviderError};
use crate::config::{ProviderBackend, ProviderDescriptor};

/// Shared, ordered log of `(provider id, variant)` calls across providers.
pub(crate) type CallLog = Arc<Mutex<Vec<(String, String)>>>;

pub(crate) fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Prompts received, in call order.
pub(crate) type PromptLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn calls(log: &CallLog) -> Vec<(String, String)> {
    log.lock().unwrap().clone()
}

/// Replays scripted results in call order, then repeats `otherwise`.
pub(crate) struct ScriptedProvider {
    id: String,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    otherwise: Result<String, ProviderError>,
    delay: Option<Duration>,
    /// Extra delay for prompts containing the given text.
    stall: Option<(String, Duration)>,
    log: CallLog,
    prompts: Option<PromptLog>,
}

impl ScriptedProvider {
    pub(crate) fn new(id: &str, log: &CallLog) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(VecDeque::new()),
            otherwise: Err(ProviderError::ServiceUnavailable("script exhausted".into())),
            delay: None,
            stall: None,
            log: Arc::clone(log),
            prompts: None,
        }
    }

    pub(crate) fn then(self, result: Result<&str, ProviderError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(result.map(String::from));
        self
    }

    pub(crate) fn otherwise(mut self, result: Result<&str, ProviderError>) -> Self {
        self.otherwise = result.map(String::from);
        self
    }

    /// Sleep before answering, to trip call timeouts.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep only when the prompt mentions `needle`, so one candidate can
    /// stall while others sharing the provider answer promptly.
    pub(crate) fn stalling_on(mut self, needle: &str, delay: Duration) -> Self {
        self.stall = Some((needle.to_string(), delay));
        self
    }

    pub(crate) fn recording_prompts(mut self, prompts: &PromptLog) -> Self {
        self.prompts = Some(Arc::clone(prompts));
        self
    }

    pub(crate) fn into_arc(self) -> Arc<dyn AnalysisProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    async fn generate(&self, variant: &str, prompt: &str) -> Result<String, ProviderError> {
        self.log
            .lock()
            .unwrap()
            .push((self.id.clone(), variant.to_string()));
        if let Some(prompts) = &self.prompts {
            prompts.lock().unwrap().push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((needle, delay)) = &self.stall {
            if prompt.contains(needle.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.otherwise.clone())
    }
}

/// Descriptor for a scripted provider; backend and URL are never used.
pub(crate) fn descriptor(id: &str, variants: &[&str], max_retries: u32) -> ProviderDescriptor {
    ProviderDescriptor {
        id: id.to_string(),
        backend: ProviderBackend::Openai,
        base_url: "http://unused".into(),
        api_key_env: None,
        variants: variants.iter().map(|v| v.to_string()).collect(),
        timeout_secs: 5,
        max_retries,
        temperature: 0.4,
    }
}
