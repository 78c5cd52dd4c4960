use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::db::HistoryEntry;
use crate::models::CandidateOutcome;

#[derive(Parser, Debug)]
#[command(
    name = "bidcheck",
    version,
    about = "Compare commercial proposals against a baseline tender document"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Config file (defaults to $BIDCHECK_CONFIG or ~/.bidcheck/config.toml)"
    )]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one or more candidates against a baseline.
    Analyze {
        #[arg(long, help = "Baseline tender document (.pdf or .docx)")]
        baseline: PathBuf,
        #[arg(
            long = "candidate",
            required = true,
            num_args = 1..,
            help = "Candidate proposal (.pdf or .docx); repeatable"
        )]
        candidates: Vec<PathBuf>,
        #[arg(long, help = "Write one PDF report per analyzed candidate here")]
        report_dir: Option<PathBuf>,
        #[arg(long, default_value_t = false, help = "Do not record results in history")]
        no_history: bool,
    },
    /// List past analyses, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub fn print_out<T: Serialize>(
    json: bool,
    items: &[T],
    line: impl Fn(&T) -> String,
) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{}", line(item));
        }
    }
    Ok(())
}

/// Tab-separated row: name, status, then metrics or the failure reason.
pub fn outcome_line(outcome: &CandidateOutcome) -> String {
    match (&outcome.metrics, &outcome.failure) {
        (Some(metrics), _) => {
            let provider = outcome
                .analysis
                .as_ref()
                .map(|a| format!("{}/{}", a.provider, a.variant))
                .unwrap_or_default();
            let report = outcome
                .report_path
                .as_ref()
                .map(|p| format!("\t{}", p.display()))
                .unwrap_or_default();
            format!(
                "{}\tok\t{}\t{}{}",
                outcome.candidate_name,
                metrics.summary(),
                provider,
                report
            )
        }
        (None, Some(failure)) => {
            let mut line = format!(
                "{}\tfailed\t{}\t{}",
                outcome.candidate_name,
                failure.kind.as_str(),
                failure.message
            );
            if !failure.attempts.is_empty() {
                let trail: Vec<String> = failure.attempts.iter().map(|a| a.to_string()).collect();
                line.push('\t');
                line.push_str(&trail.join("; "));
            }
            line
        }
        (None, None) => format!("{}\tunknown", outcome.candidate_name),
    }
}

pub fn history_line(entry: &HistoryEntry) -> String {
    format!(
        "{}\t{}\t{}",
        entry.recorded_at.format("%Y-%m-%d %H:%M"),
        entry.candidate_name,
        entry.summary
    )
}
