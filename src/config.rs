use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Bidcheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var pointing at an explicit config file.
pub const CONFIG_ENV: &str = "BIDCHECK_CONFIG";

/// Env var overriding every Ollama provider's base URL.
pub const OLLAMA_URL_ENV: &str = "BIDCHECK_OLLAMA_URL";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "bidcheck=info,warn"
}

/// Get the application data directory (~/.bidcheck/ on all platforms).
/// Falls back to the working directory when no home directory exists.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bidcheck")
}

/// Default location of the analysis history database.
pub fn history_db_path() -> PathBuf {
    app_data_dir().join("history.db")
}

/// Default location of the TOML config file.
pub fn default_config_path() -> PathBuf {
    app_data_dir().join("config.toml")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file as TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Which wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderBackend {
    /// OpenAI-compatible `/chat/completions`.
    Openai,
    /// Local Ollama `/api/generate`.
    Ollama,
}

/// One link of the fallback chain. Read-only once the process has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub backend: ProviderBackend,
    pub base_url: String,
    /// Env var holding the API key (OpenAI-compatible backends only).
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Model variants, most capable first.
    pub variants: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ProviderDescriptor {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Labels and glyphs shared by the prompt convention and the metric extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConventions {
    pub conformance_label: String,
    /// How many characters after the label may hold the percentage.
    pub lookahead_chars: usize,
    pub critical_marker: String,
    pub recommendation_label: String,
    pub approve_keywords: Vec<String>,
    pub reject_keywords: Vec<String>,
    pub revise_keywords: Vec<String>,
}

impl Default for MetricConventions {
    fn default() -> Self {
        Self {
            conformance_label: "Overall conformance".into(),
            lookahead_chars: 40,
            critical_marker: "🔴".into(),
            recommendation_label: "Recommendation".into(),
            approve_keywords: vec!["approve".into(), "approval".into()],
            reject_keywords: vec!["reject".into()],
            revise_keywords: vec!["revise".into(), "revision".into()],
        }
    }
}

/// Backoff between retries of the same model variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

/// Everything the analysis core reads from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub max_document_bytes: u64,
    pub max_pdf_pages: usize,
    /// Text budget per document, in characters.
    pub text_budget_units: usize,
    /// Candidates analyzed at the same time.
    pub max_concurrency: usize,
    /// Regexes; a normalized line matching any of them is dropped.
    pub boilerplate_patterns: Vec<String>,
    pub metrics: MetricConventions,
    pub retry: RetryConfig,
    /// Fallback chain, highest priority first.
    pub providers: Vec<ProviderDescriptor>,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_temperature() -> f32 {
    0.4
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 20 * 1024 * 1024,
            max_pdf_pages: 200,
            text_budget_units: 12_000,
            max_concurrency: 2,
            boilerplate_patterns: vec![
                r"(?i)^(strictly\s+)?confidential\b".into(),
                r"(?i)^documento\s+confidencial\b".into(),
            ],
            metrics: MetricConventions::default(),
            retry: RetryConfig::default(),
            providers: vec![
                ProviderDescriptor {
                    id: "openai".into(),
                    backend: ProviderBackend::Openai,
                    base_url: "https://api.openai.com/v1".into(),
                    api_key_env: Some("OPENAI_API_KEY".into()),
                    variants: vec!["gpt-4o".into(), "gpt-4o-mini".into()],
                    timeout_secs: default_timeout_secs(),
                    max_retries: default_max_retries(),
                    temperature: default_temperature(),
                },
                ProviderDescriptor {
                    id: "ollama".into(),
                    backend: ProviderBackend::Ollama,
                    base_url: "http://localhost:11434".into(),
                    api_key_env: None,
                    variants: vec!["llama3.1:8b".into(), "llama3.2:3b".into()],
                    timeout_secs: 300,
                    max_retries: 1,
                    temperature: default_temperature(),
                },
            ],
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl AnalyzerConfig {
    /// Resolve the config path: explicit argument, then `BIDCHECK_CONFIG`,
    /// then the default under the app data directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_config_path(),
        }
    }

    /// Load from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&contents)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        if let Ok(url) = std::env::var(OLLAMA_URL_ENV) {
            config.override_ollama_url(&url);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn override_ollama_url(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }
        for provider in self
            .providers
            .iter_mut()
            .filter(|p| p.backend == ProviderBackend::Ollama)
        {
            provider.base_url = url.to_string();
        }
    }

    /// Reject configurations the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_document_bytes == 0 {
            return Err(ConfigError::Invalid("max_document_bytes must be > 0".into()));
        }
        if self.max_pdf_pages == 0 {
            return Err(ConfigError::Invalid("max_pdf_pages must be > 0".into()));
        }
        if self.text_budget_units == 0 {
            return Err(ConfigError::Invalid("text_budget_units must be > 0".into()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be > 0".into()));
        }
        if self.metrics.conformance_label.trim().is_empty() {
            return Err(ConfigError::Invalid("metrics.conformance_label is empty".into()));
        }
        if self.metrics.critical_marker.is_empty() {
            return Err(ConfigError::Invalid("metrics.critical_marker is empty".into()));
        }
        for pattern in &self.boilerplate_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("boilerplate pattern {pattern:?}: {e}"))
            })?;
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider id {:?}",
                    provider.id
                )));
            }
            if provider.variants.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider {:?} has no model variants",
                    provider.id
                )));
            }
            if provider.timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "provider {:?} timeout_secs must be > 0",
                    provider.id
                )));
            }
        }
        Ok(())
    }
}
