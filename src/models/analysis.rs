use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prompt inputs for one candidate. Built fresh per candidate, never reused.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub baseline_text: String,
    pub candidate_text: String,
    pub candidate_name: String,
}

/// Free-form analysis returned by the first provider that succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub text: String,
    pub provider: String,
    pub variant: String,
    /// Wall time from the start of the fallback walk to the winning response.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Total provider calls made, including the winning one.
    pub attempts: usize,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Categorical recommendation mined from the analysis text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Approve,
    Reject,
    Revise,
    Undefined,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::Reject => "Reject",
            Self::Revise => "Revise",
            Self::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured summary derived from an [`AnalysisResult`]. Best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsRecord {
    /// 0-100, or `None` when the analysis did not state it recognisably.
    pub conformance: Option<u8>,
    pub critical_items: usize,
    pub recommendation: Recommendation,
    pub candidate_name: String,
}

impl MetricsRecord {
    /// The record produced when nothing could be mined.
    pub fn unknown(candidate_name: &str) -> Self {
        Self {
            conformance: None,
            critical_items: 0,
            recommendation: Recommendation::Undefined,
            candidate_name: candidate_name.to_string(),
        }
    }

    /// One-line summary handed to the history store.
    pub fn summary(&self) -> String {
        let conformance = match self.conformance {
            Some(pct) => format!("{pct}%"),
            None => "unknown".to_string(),
        };
        format!(
            "conformance={conformance} critical={} recommendation={}",
            self.critical_items, self.recommendation
        )
    }
}

/// Why a candidate could not be analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SizeLimitExceeded,
    EmptyDocument,
    UnsupportedFormat,
    UnreadableDocument,
    InvalidInput,
    AllProvidersExhausted,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::EmptyDocument => "empty_document",
            Self::UnsupportedFormat => "unsupported_format",
            Self::UnreadableDocument => "unreadable_document",
            Self::InvalidInput => "invalid_input",
            Self::AllProvidersExhausted => "all_providers_exhausted",
            Self::Internal => "internal",
        }
    }
}

/// Provider-call category, recorded per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimited,
    Unauthorized,
    Timeout,
    ServiceUnavailable,
    Malformed,
    Misconfigured,
}

/// One failed provider call in the fallback walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub variant: String,
    /// 1-based attempt number for this variant.
    pub attempt: u32,
    pub kind: ProviderErrorKind,
    pub message: String,
    pub elapsed_ms: u64,
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} #{}: {:?} ({})",
            self.provider, self.variant, self.attempt, self.kind, self.message
        )
    }
}

/// Human-readable failure recorded on a [`CandidateOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct CandidateFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Per-attempt provider trail; empty for document-layer failures.
    pub attempts: Vec<AttemptRecord>,
}

/// Result for a single candidate, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateOutcome {
    pub candidate_name: String,
    pub analysis: Option<AnalysisResult>,
    pub metrics: Option<MetricsRecord>,
    pub failure: Option<CandidateFailure>,
    /// Rendered report, when a report directory was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

impl CandidateOutcome {
    pub fn succeeded(candidate_name: &str, analysis: AnalysisResult, metrics: MetricsRecord) -> Self {
        Self {
            candidate_name: candidate_name.to_string(),
            analysis: Some(analysis),
            metrics: Some(metrics),
            failure: None,
            report_path: None,
        }
    }

    pub fn failed(candidate_name: &str, failure: CandidateFailure) -> Self {
        Self {
            candidate_name: candidate_name.to_string(),
            analysis: None,
            metrics: None,
            failure: Some(failure),
            report_path: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_formats_known_and_unknown() {
        let record = MetricsRecord {
            conformance: Some(62),
            critical_items: 1,
            recommendation: Recommendation::Revise,
            candidate_name: "Proposal A".into(),
        };
        assert_eq!(record.summary(), "conformance=62% critical=1 recommendation=Revise");
        assert_eq!(
            MetricsRecord::unknown("x").summary(),
            "conformance=unknown critical=0 recommendation=Undefined"
        );
    }

    #[test]
    fn outcome_constructors_keep_fields_consistent() {
        let failure = CandidateFailure {
            kind: FailureKind::EmptyDocument,
            message: "blank".into(),
            attempts: vec![],
        };
        let outcome = CandidateOutcome::failed("B", failure);
        assert!(!outcome.is_success());
        assert!(outcome.metrics.is_none());
        assert!(outcome.analysis.is_none());
    }

    #[test]
    fn analysis_result_serializes_elapsed_as_millis() {
        let result = AnalysisResult {
            text: "ok".into(),
            provider: "openai".into(),
            variant: "gpt-4o".into(),
            elapsed: Duration::from_millis(1500),
            attempts: 2,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"elapsed_ms\":1500"));
        assert!(json.contains("\"attempts\":2"));
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::AllProvidersExhausted).unwrap();
        assert_eq!(json, "\"all_providers_exhausted\"");
        assert_eq!(FailureKind::AllProvidersExhausted.as_str(), "all_providers_exhausted");
    }
}
