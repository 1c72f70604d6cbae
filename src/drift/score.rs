//! Freshness scoring
//!
//! A score is a pure function of one artifact's issue set.

use super::{Category, Issue, Severity};
use crate::config::ScoringConfig;
use serde::{Deserialize, Serialize};

/// Documentation freshness of one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessScore {
    #[serde(rename = "path")]
    pub artifact_path: String,
    /// 0 - 100, higher is fresher
    pub score: u32,
    /// Worst issue severity, None without issues
    pub severity: Option<Severity>,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Issue ids the score was derived from, in the order given
    pub derived_from: Vec<String>,
}

/// Score an artifact from its issues
pub fn score_artifact(path: &str, issues: &[Issue], config: &ScoringConfig) -> FreshnessScore {
    let penalty = issues
        .iter()
        .map(|i| config.weight(i.severity))
        .fold(0u32, u32::saturating_add);
    let mut score = 100u32.saturating_sub(penalty);

    let undecodable = issues.iter().any(|i| i.category == Category::EncodingFailure);
    if undecodable {
        score = score.min(config.encoding_cap);
    }

    let mut confidence = if issues.is_empty() {
        1.0
    } else {
        let mean = issues.iter().map(|i| i.confidence).sum::<f64>() / issues.len() as f64;
        (mean * 10_000.0).round() / 10_000.0
    };
    if undecodable {
        confidence = confidence.min(0.2);
    }

    FreshnessScore {
        artifact_path: path.to_string(),
        score,
        severity: issues.iter().map(|i| i.severity).max(),
        confidence: confidence.clamp(0.0, 1.0),
        derived_from: issues.iter().map(|i| i.id.clone()).collect(),
    }
}
