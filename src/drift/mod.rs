//! Drift analysis engine
//!
//! This module detects where documentation no longer matches code by:
//! - Applying per-artifact drift rules (parameters, status, references, contracts)
//! - Turning each finding into an Issue with a stable id
//! - Deriving a freshness score from the issues of each artifact

mod analyzer;
mod rules;
mod score;

pub use analyzer::{ArtifactAnalysis, DriftAnalyzer};
pub use rules::{
    ContractParityRule, DriftRule, EncodingRule, ParameterCoverageRule, ReferenceIntegrityRule,
    RuleContext, RuleSet, StatusConsistencyRule, TraceabilityRule,
};
pub use score::{score_artifact, FreshnessScore};

use crate::extract::{content_hash, DocStatus};
use serde::{Deserialize, Serialize};

/// Severity level of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor: Documentation is incomplete
    Minor,
    /// Major: Documentation makes a false claim
    Major,
    /// Critical: The artifact could not be audited at all
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Major => write!(f, "MAJOR"),
            Severity::Minor => write!(f, "MINOR"),
        }
    }
}

/// Kind of drift an issue reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MissingParamDoc,
    StaleReference,
    StatusMismatch,
    EncodingFailure,
    ContractDrift,
    TraceabilityGap,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MissingParamDoc => "missing_param_doc",
            Category::StaleReference => "stale_reference",
            Category::StatusMismatch => "status_mismatch",
            Category::EncodingFailure => "encoding_failure",
            Category::ContractDrift => "contract_drift",
            Category::TraceabilityGap => "traceability_gap",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The exact text a rule examined, kept so a fix can be synthesized later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixHint {
    /// Add `line` after the examined description
    AppendParam { description: String, line: String },
    /// Drop a line that mentions `reference`
    RemoveLine { line: String, reference: String },
    /// Swap the status word on the examined status line
    ReplaceStatus {
        line: String,
        from: DocStatus,
        to: DocStatus,
    },
}

/// A single drift finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Stable identifier derived from category, target, and subject
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    /// Artifact the issue is reported against
    pub target_artifact: String,
    /// Subject entity, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// What the documentation should say
    pub expected: String,
    /// What it says instead
    pub actual: String,
    /// Why it matters
    pub impact: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Examined text for deterministic fixes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixHint>,
}

impl Issue {
    /// Create a new issue; `subject` distinguishes issues of one category in one artifact
    pub fn new(
        category: Category,
        severity: Severity,
        target_artifact: &str,
        subject: &str,
        confidence: f64,
    ) -> Self {
        Self {
            id: issue_id(category, target_artifact, subject),
            category,
            severity,
            target_artifact: target_artifact.to_string(),
            entity: None,
            expected: String::new(),
            actual: String::new(),
            impact: String::new(),
            confidence: confidence.clamp(0.0, 1.0),
            fix: None,
        }
    }

    /// Set the subject entity
    pub fn with_entity(mut self, entity_id: &str) -> Self {
        self.entity = Some(entity_id.to_string());
        self
    }

    /// Set expected/actual/impact text
    pub fn with_details(mut self, expected: &str, actual: &str, impact: &str) -> Self {
        self.expected = expected.to_string();
        self.actual = actual.to_string();
        self.impact = impact.to_string();
        self
    }

    /// Attach a fix hint
    pub fn with_fix(mut self, fix: FixHint) -> Self {
        self.fix = Some(fix);
        self
    }
}

/// Stable issue id: `DF-` followed by 12 hex digits of a SHA-256
pub fn issue_id(category: Category, target_artifact: &str, subject: &str) -> String {
    let digest = content_hash(&format!("{}|{}|{}", category.as_str(), target_artifact, subject));
    format!("DF-{}", &digest[..12])
}
