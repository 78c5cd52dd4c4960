//! Pipeline Coordinator.
//!
//! Single entry point that drives one analysis run:
//! normalize baseline → for each candidate: normalize → bound → prompt →
//! fallback chain → metrics → (history, report).
//!
//! Every engine is injected, so the coordinator stays fully testable with
//! scripted providers. Candidate failures are recorded, never propagated.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::budget::bound;
use super::extraction::{DocumentNormalizer, ExtractionError};
use super::fallback::{FallbackError, FallbackOrchestrator};
use super::metrics::MetricExtractor;
use super::prompt::{PromptBuilder, PromptError};
use crate::config::{AnalyzerConfig, ConfigError};
use crate::db::{HistoryEntry, HistorySink};
use crate::models::{
    AnalysisRequest, AnalysisResult, CandidateFailure, CandidateOutcome, FailureKind,
    MetricsRecord, NormalizedText, SourceDocument,
};
use crate::report::ReportOutput;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why one candidate's pipeline stopped. Converted into a [`CandidateFailure`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Prompt construction failed: {0}")]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Fallback(#[from] FallbackError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Extraction(ExtractionError::SizeLimitExceeded { .. }) => {
                FailureKind::SizeLimitExceeded
            }
            Self::Extraction(ExtractionError::EmptyDocument(_)) => FailureKind::EmptyDocument,
            Self::Extraction(ExtractionError::UnsupportedFormat(_)) => {
                FailureKind::UnsupportedFormat
            }
            Self::Extraction(_) => FailureKind::UnreadableDocument,
            Self::Prompt(_) => FailureKind::InvalidInput,
            Self::Fallback(_) => FailureKind::AllProvidersExhausted,
            Self::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn into_failure(self) -> CandidateFailure {
        let kind = self.kind();
        let message = self.to_string();
        let attempts = match self {
            Self::Fallback(FallbackError::AllProvidersExhausted { attempts }) => attempts,
            _ => Vec::new(),
        };
        CandidateFailure {
            kind,
            message,
            attempts,
        }
    }
}

/// Failures that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Baseline document {name} is unreadable: {source}")]
    BaselineUnreadable {
        name: String,
        #[source]
        source: ExtractionError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Drives the baseline once and every candidate independently.
pub struct AnalysisCoordinator {
    normalizer: Arc<DocumentNormalizer>,
    prompts: PromptBuilder,
    chain: FallbackOrchestrator,
    metrics: MetricExtractor,
    max_document_bytes: u64,
    text_budget_units: usize,
    max_concurrency: usize,
    reports: Option<Arc<ReportOutput>>,
    history: Option<Arc<dyn HistorySink>>,
}

impl AnalysisCoordinator {
    pub fn new(
        config: &AnalyzerConfig,
        normalizer: DocumentNormalizer,
        chain: FallbackOrchestrator,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            normalizer: Arc::new(normalizer),
            prompts: PromptBuilder::new(config.metrics.clone()),
            chain,
            metrics: MetricExtractor::new(&config.metrics)?,
            max_document_bytes: config.max_document_bytes,
            text_budget_units: config.text_budget_units,
            max_concurrency: config.max_concurrency.max(1),
            reports: None,
            history: None,
        })
    }

    /// Render a report for every successful candidate.
    pub fn with_reports(mut self, reports: ReportOutput) -> Self {
        self.reports = Some(Arc::new(reports));
        self
    }

    /// Append a history record for every successful candidate.
    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    /// Analyze every candidate against the baseline.
    ///
    /// Outcomes come back in submission order. Only an unreadable baseline
    /// fails the run.
    pub async fn run(
        &self,
        baseline: SourceDocument,
        candidates: Vec<SourceDocument>,
    ) -> Result<Vec<CandidateOutcome>, RunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analysis_run",
            run_id = %run_id,
            baseline = %baseline.name(),
            candidates = candidates.len()
        );

        async move {
            let baseline_name = baseline.name().to_string();
            let baseline_text = match self.normalize(baseline).await {
                Ok(text) => bound(text.text(), self.text_budget_units),
                Err(PipelineError::Extraction(source)) => {
                    tracing::error!(error = %source, "Baseline unreadable, aborting run");
                    return Err(RunError::BaselineUnreadable {
                        name: baseline_name,
                        source,
                    });
                }
                Err(e) => return Err(RunError::Internal(e.to_string())),
            };

            let outcomes: Vec<CandidateOutcome> = stream::iter(candidates)
                .map(|doc| self.process_candidate(run_id, &baseline_text, doc))
                .buffered(self.max_concurrency)
                .collect()
                .await;

            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            tracing::info!(
                succeeded = outcomes.len() - failed,
                failed,
                "Analysis run complete"
            );
            Ok(outcomes)
        }
        .instrument(span)
        .await
    }

    async fn process_candidate(
        &self,
        run_id: Uuid,
        baseline_text: &str,
        doc: SourceDocument,
    ) -> CandidateOutcome {
        let name = doc.name().to_string();
        let span = tracing::info_span!("candidate", candidate = %name);

        async {
            match self.analyze_candidate(baseline_text, doc).await {
                Ok((analysis, metrics)) => {
                    tracing::info!(
                        provider = %analysis.provider,
                        variant = %analysis.variant,
                        summary = %metrics.summary(),
                        "Candidate analyzed"
                    );
                    let report_path = self.publish(run_id, &analysis, &metrics).await;
                    let mut outcome = CandidateOutcome::succeeded(&name, analysis, metrics);
                    outcome.report_path = report_path;
                    outcome
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Candidate failed");
                    CandidateOutcome::failed(&name, e.into_failure())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn analyze_candidate(
        &self,
        baseline_text: &str,
        doc: SourceDocument,
    ) -> Result<(AnalysisResult, MetricsRecord), PipelineError> {
        let candidate_name = doc.name().to_string();
        let normalized = self.normalize(doc).await?;

        let request = AnalysisRequest {
            baseline_text: baseline_text.to_string(),
            candidate_text: bound(normalized.text(), self.text_budget_units),
            candidate_name,
        };
        let prompt = self.prompts.build_for(&request)?;
        let analysis = self.chain.analyze(&prompt).await?;
        let metrics = self.metrics.extract(&analysis.text, &request.candidate_name);
        Ok((analysis, metrics))
    }

    /// CPU-bound extraction runs on the blocking pool.
    async fn normalize(&self, doc: SourceDocument) -> Result<NormalizedText, PipelineError> {
        let normalizer = Arc::clone(&self.normalizer);
        let limit = self.max_document_bytes;
        let text = tokio::task::spawn_blocking(move || normalizer.normalize(&doc, limit))
            .await
            .map_err(|e| PipelineError::Internal(format!("normalization task failed: {e}")))??;
        Ok(text)
    }

    /// Feed the optional sinks. Their failures are logged, never surfaced.
    async fn publish(
        &self,
        run_id: Uuid,
        analysis: &AnalysisResult,
        metrics: &MetricsRecord,
    ) -> Option<PathBuf> {
        if let Some(history) = &self.history {
            let history = Arc::clone(history);
            let entry = HistoryEntry::new(
                run_id,
                &metrics.candidate_name,
                metrics.summary(),
                &analysis.text,
            );
            match tokio::task::spawn_blocking(move || history.append(&entry)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Failed to record history"),
                Err(e) => tracing::warn!(error = %e, "History task failed"),
            }
        }

        let reports = Arc::clone(self.reports.as_ref()?);
        let name = metrics.candidate_name.clone();
        let text = analysis.text.clone();
        match tokio::task::spawn_blocking(move || reports.write(&name, &text)).await {
            Ok(Ok(path)) => Some(path),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to render report");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Report task failed");
                None
            }
        }
    }
}
