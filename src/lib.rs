pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use cli::{history_line, outcome_line, print_out, Cli, Commands};
use config::{AnalyzerConfig, ConfigError};
use db::{DatabaseError, SqliteHistory};
use models::{CandidateFailure, CandidateOutcome, FailureKind, SourceDocument};
use pipeline::{
    AnalysisCoordinator, DocumentNormalizer, FallbackOrchestrator, ProviderError, RunError,
};
use report::{PdfReportRenderer, ReportOutput};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("History store error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Binary entry point: tracing, CLI parsing, dispatch.
pub async fn run() -> ExitCode {
    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config_path = AnalyzerConfig::resolve_path(cli.config.as_deref());
    let config = AnalyzerConfig::load(&config_path)?;

    match cli.command {
        Commands::Analyze {
            baseline,
            candidates,
            report_dir,
            no_history,
        } => {
            let outcomes = analyze(
                &config,
                &baseline,
                &candidates,
                report_dir.as_deref(),
                !no_history,
            )
            .await?;
            print_out(cli.json, &outcomes, outcome_line)?;
        }
        Commands::History { limit } => {
            let history = SqliteHistory::open(&config::history_db_path())?;
            print_out(cli.json, &history.recent(limit)?, history_line)?;
        }
    }
    Ok(())
}

/// Build the pipeline from configuration and analyze files on disk.
///
/// A candidate file that cannot be read becomes a failed outcome in its
/// submission slot; only the baseline is required.
pub async fn analyze(
    config: &AnalyzerConfig,
    baseline_path: &Path,
    candidate_paths: &[PathBuf],
    report_dir: Option<&Path>,
    record_history: bool,
) -> Result<Vec<CandidateOutcome>, AppError> {
    let baseline =
        SourceDocument::from_path(baseline_path, config.max_document_bytes).map_err(|source| {
            AppError::Read {
                path: baseline_path.to_path_buf(),
                source,
            }
        })?;

    let normalizer = DocumentNormalizer::from_config(config)?;
    let chain = FallbackOrchestrator::from_config(config)?;
    let mut coordinator = AnalysisCoordinator::new(config, normalizer, chain)?;

    if record_history {
        match SqliteHistory::open(&config::history_db_path()) {
            Ok(history) => coordinator = coordinator.with_history(Arc::new(history)),
            Err(e) => tracing::warn!(error = %e, "History store unavailable, not recording"),
        }
    }
    if let Some(dir) = report_dir {
        let renderer = PdfReportRenderer::new(&config.metrics.critical_marker);
        coordinator = coordinator.with_reports(ReportOutput::new(Box::new(renderer), dir));
    }

    let mut slots: Vec<Option<CandidateOutcome>> = Vec::with_capacity(candidate_paths.len());
    let mut readable = Vec::new();
    for path in candidate_paths {
        match SourceDocument::from_path(path, config.max_document_bytes) {
            Ok(doc) => {
                readable.push(doc);
                slots.push(None);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read candidate");
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                slots.push(Some(CandidateOutcome::failed(
                    &name,
                    CandidateFailure {
                        kind: FailureKind::UnreadableDocument,
                        message: format!("Cannot read {}: {e}", path.display()),
                        attempts: Vec::new(),
                    },
                )));
            }
        }
    }

    let mut analyzed = coordinator.run(baseline, readable).await?.into_iter();
    Ok(slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| analyzed.next()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::docx::tests::make_test_docx;

    fn offline_config() -> AnalyzerConfig {
        AnalyzerConfig {
            providers: vec![],
            ..AnalyzerConfig::default()
        }
    }

    #[tokio::test]
    async fn unreadable_candidate_keeps_its_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let baseline = tmp.path().join("edital.docx");
        std::fs::write(&baseline, make_test_docx(&["Delivery within 30 days"])).unwrap();
        let candidate = tmp.path().join("proposal.docx");
        std::fs::write(&candidate, make_test_docx(&["Delivery within 45 days"])).unwrap();

        let outcomes = analyze(
            &offline_config(),
            &baseline,
            &[tmp.path().join("missing.pdf"), candidate],
            None,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].candidate_name, "missing.pdf");
        assert_eq!(
            outcomes[0].failure.as_ref().unwrap().kind,
            FailureKind::UnreadableDocument
        );
        assert_eq!(outcomes[1].candidate_name, "proposal.docx");
        assert_eq!(
            outcomes[1].failure.as_ref().unwrap().kind,
            FailureKind::AllProvidersExhausted
        );
    }

    #[tokio::test]
    async fn oversized_candidate_file_fails_by_size() {
        let tmp = tempfile::tempdir().unwrap();
        let baseline = tmp.path().join("edital.docx");
        std::fs::write(&baseline, make_test_docx(&["Delivery within 30 days"])).unwrap();
        let candidate = tmp.path().join("huge.pdf");
        std::fs::write(&candidate, vec![0u8; 4096]).unwrap();
        let config = AnalyzerConfig {
            max_document_bytes: 2048,
            ..offline_config()
        };

        let outcomes = analyze(&config, &baseline, &[candidate], None, false)
            .await
            .unwrap();
        assert_eq!(
            outcomes[0].failure.as_ref().unwrap().kind,
            FailureKind::SizeLimitExceeded
        );
    }

    #[tokio::test]
    async fn missing_baseline_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = analyze(
            &offline_config(),
            &tmp.path().join("nope.pdf"),
            &[],
            None,
            false,
        )
        .await;
        assert!(matches!(result, Err(AppError::Read { .. })));
    }

    #[tokio::test]
    async fn blank_baseline_aborts_run() {
        let tmp = tempfile::tempdir().unwrap();
        let baseline = tmp.path().join("edital.docx");
        std::fs::write(&baseline, make_test_docx(&["", "  "])).unwrap();

        let result = analyze(&offline_config(), &baseline, &[], None, false).await;
        assert!(matches!(
            result,
            Err(AppError::Run(RunError::BaselineUnreadable { .. }))
        ));
    }

    #[tokio::test]
    async fn invalid_config_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "max_concurrency = 0\n").unwrap();

        let cli = Cli::try_parse_from([
            "bidcheck",
            "--config",
            config_path.to_str().unwrap(),
            "history",
        ])
        .unwrap();
        assert!(matches!(execute(cli).await, Err(AppError::Config(_))));
    }
}
