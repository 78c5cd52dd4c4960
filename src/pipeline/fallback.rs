use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::providers::{build_provider, AnalysisProvider, Disposition, ProviderError};
use crate::config::{AnalyzerConfig, ProviderDescriptor, RetryConfig};
use crate::models::{AnalysisResult, AttemptRecord};

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("All providers exhausted after {} failed attempts", .attempts.len())]
    AllProvidersExhausted { attempts: Vec<AttemptRecord> },
}

/// One link of the fallback chain: read-only descriptor plus its backend.
#[derive(Clone)]
pub struct Provider {
    pub descriptor: ProviderDescriptor,
    pub backend: Arc<dyn AnalysisProvider>,
}

/// Exponential backoff between retries of the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    cap: Duration,
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << exp).min(self.cap)
    }
}

/// Walks the provider chain in strict priority order until one variant
/// returns non-empty text.
#[derive(Clone)]
pub struct FallbackOrchestrator {
    providers: Vec<Provider>,
    retry: RetryPolicy,
}

impl FallbackOrchestrator {
    pub fn new(providers: Vec<Provider>, retry: RetryPolicy) -> Self {
        Self { providers, retry }
    }

    /// Build the HTTP-backed chain from configuration, once per process.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, ProviderError> {
        let providers = config
            .providers
            .iter()
            .map(|descriptor| {
                Ok(Provider {
                    descriptor: descriptor.clone(),
                    backend: build_provider(descriptor)?,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;
        Ok(Self::new(providers, RetryPolicy::from_config(&config.retry)))
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub async fn analyze(&self, prompt: &str) -> Result<AnalysisResult, FallbackError> {
        let started = Instant::now();
        let mut failures: Vec<AttemptRecord> = Vec::new();
        let mut calls = 0usize;

        'providers: for provider in &self.providers {
            let descriptor = &provider.descriptor;

            for variant in &descriptor.variants {
                let mut attempt: u32 = 0;
                loop {
                    attempt += 1;
                    calls += 1;
                    let call_started = Instant::now();

                    let outcome = match tokio::time::timeout(
                        descriptor.timeout(),
                        provider.backend.generate(variant, prompt),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ProviderError::Timeout(format!(
                            "no response within {}s",
                            descriptor.timeout_secs
                        ))),
                    };

                    let error = match outcome {
                        Ok(text) if !text.trim().is_empty() => {
                            tracing::info!(
                                provider = %descriptor.id,
                                variant = %variant,
                                attempts = calls,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "Analysis produced"
                            );
                            return Ok(AnalysisResult {
                                text,
                                provider: descriptor.id.clone(),
                                variant: variant.clone(),
                                elapsed: started.elapsed(),
                                attempts: calls,
                            });
                        }
                        Ok(_) => ProviderError::Malformed("empty analysis text".into()),
                        Err(e) => e,
                    };

                    tracing::warn!(
                        provider = %descriptor.id,
                        variant = %variant,
                        attempt,
                        error = %error,
                        "Provider call failed"
                    );
                    failures.push(AttemptRecord {
                        provider: descriptor.id.clone(),
                        variant: variant.clone(),
                        attempt,
                        kind: error.kind(),
                        message: error.to_string(),
                        elapsed_ms: call_started.elapsed().as_millis() as u64,
                    });

                    match error.disposition() {
                        Disposition::Retry if attempt <= descriptor.max_retries => {
                            tokio::time::sleep(self.retry.backoff(attempt)).await;
                        }
                        Disposition::SkipProvider => {
                            tracing::info!(provider = %descriptor.id, "Skipping provider");
                            continue 'providers;
                        }
                        // Retries exhausted or not retryable: next variant.
                        _ => break,
                    }
                }
            }
        }

        Err(FallbackError::AllProvidersExhausted { attempts: failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderErrorKind;
    use crate::pipeline::providers::mock::{call_log, calls, descriptor, ScriptedProvider};

    fn provider(descriptor: ProviderDescriptor, backend: ScriptedProvider) -> Provider {
        Provider {
            descriptor,
            backend: backend.into_arc(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(4))
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(p, v)| (p.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(Duration::from_millis(500), Duration::from_millis(8_000));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(10), Duration::from_millis(8_000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(8_000));
    }

    #[tokio::test]
    async fn first_success_wins() {
        let log = call_log();
        let chain = FallbackOrchestrator::new(
            vec![
                provider(
                    descriptor("primary", &["big", "small"], 2),
                    ScriptedProvider::new("primary", &log).then(Ok("Overall conformance: 90%")),
                ),
                provider(
                    descriptor("backup", &["x"], 0),
                    ScriptedProvider::new("backup", &log).otherwise(Ok("never")),
                ),
            ],
            fast_retry(),
        );

        let result = chain.analyze("prompt").await.unwrap();
        assert_eq!(result.text, "Overall conformance: 90%");
        assert_eq!(result.provider, "primary");
        assert_eq!(result.variant, "big");
        assert_eq!(result.attempts, 1);
        assert_eq!(calls(&log), pairs(&[("primary", "big")]));
    }

    #[tokio::test]
    async fn exhausts_retries_and_variants_before_next_provider() {
        let log = call_log();
        let chain = FallbackOrchestrator::new(
            vec![
                provider(
                    descriptor("primary", &["big", "small"], 1),
                    ScriptedProvider::new("primary", &log)
                        .otherwise(Err(ProviderError::RateLimited("429".into()))),
                ),
                provider(
                    descriptor("backup", &["local"], 0),
                    ScriptedProvider::new("backup", &log).then(Ok("analysis")),
                ),
            ],
            fast_retry(),
        );

        let result = chain.analyze("prompt").await.unwrap();
        assert_eq!(result.provider, "backup");
        assert_eq!(result.attempts, 5);
        assert_eq!(
            calls(&log),
            pairs(&[
                ("primary", "big"),
                ("primary", "big"),
                ("primary", "small"),
                ("primary", "small"),
                ("backup", "local"),
            ])
        );
    }

    #[tokio::test]
    async fn transient_errors_retry_same_variant() {
        let log = call_log();
        let chain = FallbackOrchestrator::new(
            vec![provider(
                descriptor("primary", &["big", "small"], 2),
                ScriptedProvider::new("primary", &log)
                    .then(Err(ProviderError::RateLimited("429".into())))
                    .then(Err(ProviderError::ServiceUnavailable("503".into())))
                    .then(Ok("done")),
            )],
            fast_retry(),
        );

        let result = chain.analyze("prompt").await.unwrap();
        assert_eq!(result.variant, "big");
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn malformed_degrades_without_retry() {
        let log = call_log();
        let chain = FallbackOrchestrator::new(
            vec![provider(
                descriptor("primary", &["big", "small"], 3),
                ScriptedProvider::new("primary", &log)
                    .then(Err(ProviderError::Malformed("bad json".into())))
                    .then(Ok("cheaper answer")),
            )],
            fast_retry(),
        );

        let result = chain.analyze("prompt").await.unwrap();
        assert_eq!(result.variant, "small");
        assert_eq!(calls(&log), pairs(&[("primary", "big"), ("primary", "small")]));
    }

    #[tokio::test]
    async fn blank_text_is_not_a_success() {
        let log = call_log();
        let chain = FallbackOrchestrator::new(
            vec![provider(
                descriptor("primary", &["big", "small"], 2),
                ScriptedProvider::new("primary", &log)
                    .then(Ok("   \n"))
                    .then(Ok("real text")),
            )],
            fast_retry(),
        );

        let result = chain.analyze("prompt").await.unwrap();
        assert_eq!(result.text, "real text");
        assert_eq!(result.variant, "small");
    }

    #[tokio::test]
    async fn unauthorized_skips_remaining_variants() {
        let log = call_log();
        let chain = FallbackOrchestrator::new(
            vec![
                provider(
                    descriptor("primary", &["big", "small"], 3),
                    ScriptedProvider::new("primary", &log)
                        .otherwise(Err(ProviderError::Unauthorized("401".into()))),
                ),
                provider(
                    descriptor("backup", &["local"], 0),
                    ScriptedProvider::new("backup", &log).then(Ok("fallback analysis")),
                ),
            ],
            fast_retry(),
        );

        let result = chain.analyze("prompt").await.unwrap();
        assert_eq!(result.provider, "backup");
        assert_eq!(calls(&log), pairs(&[("primary", "big"), ("backup", "local")]));
    }

    #[tokio::test]
    async fn all_failures_are_reported_in_order() {
        let log = call_log();
        let chain = FallbackOrchestrator::new(
            vec![
                provider(
                    descriptor("a", &["a1"], 0),
                    ScriptedProvider::new("a", &log)
                        .otherwise(Err(ProviderError::Unauthorized("401".into()))),
                ),
                provider(
                    descriptor("b", &["b1"], 0),
                    ScriptedProvider::new("b", &log)
                        .otherwise(Err(ProviderError::Misconfigured("no key".into()))),
                ),
            ],
            fast_retry(),
        );

        let FallbackError::AllProvidersExhausted { attempts } =
            chain.analyze("prompt").await.unwrap_err();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].provider, "a");
        assert_eq!(attempts[0].kind, ProviderErrorKind::Unauthorized);
        assert_eq!(attempts[1].provider, "b");
        assert_eq!(attempts[1].kind, ProviderErrorKind::Misconfigured);
        assert_eq!(attempts[1].attempt, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_and_falls_through() {
        let log = call_log();
        let mut slow = descriptor("slow", &["big"], 0);
        slow.timeout_secs = 1;
        let chain = FallbackOrchestrator::new(
            vec![
                provider(
                    slow,
                    ScriptedProvider::new("slow", &log)
                        .with_delay(Duration::from_secs(30))
                        .otherwise(Ok("too late")),
                ),
                provider(
                    descriptor("fast", &["small"], 0),
                    ScriptedProvider::new("fast", &log).then(Ok("on time")),
                ),
            ],
            fast_retry(),
        );

        let result = chain.analyze("prompt").await.unwrap();
        assert_eq!(result.provider, "fast");
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn empty_chain_is_exhausted() {
        let chain = FallbackOrchestrator::new(vec![], fast_retry());
        let err = chain.analyze("prompt").await.unwrap_err();
        assert!(matches!(err, FallbackError::AllProvidersExhausted { attempts } if attempts.is_empty()));
    }

    #[test]
    fn from_config_builds_chain_in_order() {
        let chain = FallbackOrchestrator::from_config(&AnalyzerConfig::default()).unwrap();
        let ids: Vec<&str> = chain
            .providers()
            .iter()
            .map(|p| p.descriptor.id.as_str())
            .collect();
        assert_eq!(ids, vec!["openai", "ollama"]);
    }
}
