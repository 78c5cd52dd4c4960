use thiserror::Error;

use crate::config::MetricConventions;
use crate::models::AnalysisRequest;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PromptError {
    #[error("Invalid prompt input: {0}")]
    InvalidInput(String),
}

pub const REVIEWER_SYSTEM_PROMPT: &str = r#"
You are a technical evaluator of proposals submitted to public and private
tenders. Your role is to compare a commercial proposal against the baseline
tender document and report how well the proposal conforms to it.

RULES:
1. Judge ONLY against requirements explicitly stated in the baseline.
2. Quote or paraphrase the baseline clause behind every unmet item.
3. Treat vague promises and omissions as unmet.
4. Follow the requested output sections exactly and in order.
"#;

/// Composes the analysis prompt. Label strings come from the same
/// conventions the metric extractor reads back.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    conventions: MetricConventions,
}

impl PromptBuilder {
    pub fn new(conventions: MetricConventions) -> Self {
        Self { conventions }
    }

    /// Build the prompt for one candidate. Both bounded texts must be non-blank.
    pub fn build(
        &self,
        baseline_text: &str,
        candidate_text: &str,
        candidate_name: &str,
    ) -> Result<String, PromptError> {
        if baseline_text.trim().is_empty() {
            return Err(PromptError::InvalidInput("baseline text is empty".into()));
        }
        if candidate_text.trim().is_empty() {
            return Err(PromptError::InvalidInput(format!(
                "candidate text for {candidate_name:?} is empty"
            )));
        }

        let label = &self.conventions.conformance_label;
        let marker = &self.conventions.critical_marker;
        let recommendation = &self.conventions.recommendation_label;

        Ok(format!(
            r#"Compare the proposal below with the baseline tender document.
Find requirements that are met, unmet or only vaguely addressed, and omissions.

<baseline>
{baseline_text}
</baseline>

<proposal name="{candidate_name}">
{candidate_text}
</proposal>

Answer with exactly these sections:
1. {label}: <integer 0-100>%
2. Met items: one bullet per requirement the proposal satisfies.
3. Unmet or vague items: one bullet per requirement missing or vaguely promised.
4. Critical risks: one line per risk, each starting with {marker}
5. Recommendations: concrete changes the bidder must make.
Finish with a single line "{recommendation}: Approve", "{recommendation}: Reject" or "{recommendation}: Revise".
"#
        ))
    }

    /// Convenience over [`PromptBuilder::build`] for a prepared request.
    pub fn build_for(&self, request: &AnalysisRequest) -> Result<String, PromptError> {
        self.build(
            &request.baseline_text,
            &request.candidate_text,
            &request.candidate_name,
        )
    }
}
