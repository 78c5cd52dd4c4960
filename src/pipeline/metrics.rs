use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::budget::bound;
use crate::config::{ConfigError, MetricConventions};
use crate::models::{MetricsRecord, Recommendation};

/// A percentage: integer or decimal (dot or comma), then `%`.
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+(?:[.,]\d+)?)\s*%").expect("valid regex"));

/// Tolerant miner of conformance, critical-item count and recommendation
/// from free-form analysis text. Never fails once constructed.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    conformance_label: Regex,
    recommendation_label: Option<Regex>,
    lookahead_chars: usize,
    critical_marker: String,
    /// Priority order: Approve, Reject, Revise. The first category with a hit wins.
    keywords: Vec<(Recommendation, Regex)>,
}

impl MetricExtractor {
    pub fn new(conventions: &MetricConventions) -> Result<Self, ConfigError> {
        let conformance_label = literal_pattern(&conventions.conformance_label)?
            .ok_or_else(|| ConfigError::Invalid("metrics.conformance_label is empty".into()))?;
        let recommendation_label = literal_pattern(&conventions.recommendation_label)?;

        let mut keywords = Vec::new();
        for (category, words) in [
            (Recommendation::Approve, &conventions.approve_keywords),
            (Recommendation::Reject, &conventions.reject_keywords),
            (Recommendation::Revise, &conventions.revise_keywords),
        ] {
            if let Some(re) = keyword_pattern(words)? {
                keywords.push((category, re));
            }
        }

        Ok(Self {
            conformance_label,
            recommendation_label,
            lookahead_chars: conventions.lookahead_chars,
            critical_marker: conventions.critical_marker.clone(),
            keywords,
        })
    }

    pub fn extract(&self, analysis_text: &str, candidate_name: &str) -> MetricsRecord {
        if analysis_text.trim().is_empty() {
            return MetricsRecord::unknown(candidate_name);
        }

        MetricsRecord {
            conformance: self.conformance(analysis_text),
            critical_items: self.critical_items(analysis_text),
            recommendation: self.recommendation(analysis_text),
            candidate_name: candidate_name.to_string(),
        }
    }

    /// First percentage within the lookahead window after the first label.
    fn conformance(&self, text: &str) -> Option<u8> {
        let label = self.conformance_label.find(text)?;
        let window = bound(&text[label.end()..], self.lookahead_chars);
        let caps = PERCENT_RE.captures(&window)?;
        let value: f64 = caps[1].replace(',', ".").parse().ok()?;
        let rounded = value.round();
        if (0.0..=100.0).contains(&rounded) {
            Some(rounded as u8)
        } else {
            None
        }
    }

    fn critical_items(&self, text: &str) -> usize {
        if self.critical_marker.is_empty() {
            return 0;
        }
        text.matches(self.critical_marker.as_str()).count()
    }

    /// Scan after the last recommendation label when present, else everywhere.
    fn recommendation(&self, text: &str) -> Recommendation {
        let region = self
            .recommendation_label
            .as_ref()
            .and_then(|re| re.find_iter(text).last())
            .map(|m| &text[m.end()..])
            .unwrap_or(text);

        self.keywords
            .iter()
            .find(|(_, re)| re.is_match(region))
            .map(|(category, _)| *category)
            .unwrap_or(Recommendation::Undefined)
    }
}

/// Case-insensitive literal match; `None` for a blank phrase.
fn literal_pattern(phrase: &str) -> Result<Option<Regex>, ConfigError> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&regex::escape(phrase))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| ConfigError::Invalid(format!("metric label {phrase:?}: {e}")))
}

/// Case-insensitive alternation of keywords anchored at a word start.
fn keyword_pattern(words: &[String]) -> Result<Option<Regex>, ConfigError> {
    let alternatives: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&format!(r"\b(?:{})", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| ConfigError::Invalid(format!("recommendation keywords: {e}")))
}
