//! Audit report assembly
//!
//! The final reduction over per-artifact results: a scorecard, the ordered
//! issue and patch lists, and repository-wide recommendations.

use crate::drift::{ArtifactAnalysis, Category, FreshnessScore, Issue, Severity};
use crate::patch::PatchSuggestion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A code entity with no documentation at all
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndocumentedEntity {
    pub id: String,
    pub artifact_path: String,
    pub name: String,
    /// Rendered signature including the declared return type
    pub signature: String,
}

/// A repository-level follow-up action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Issue category this recommendation clusters, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub message: String,
    /// Affected artifacts, sorted
    pub artifacts: Vec<String>,
    /// Issues behind the recommendation, in report order
    pub issue_ids: Vec<String>,
}

/// Repository-wide health band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Healthy,
    NeedsAttention,
    Critical,
}

impl OverallHealth {
    /// Any critical issue or an average below 70 is critical; below 90 or
    /// any major issue needs attention
    fn classify(average: f64, critical: usize, major: usize) -> Self {
        if critical > 0 || average < 70.0 {
            Self::Critical
        } else if major > 0 || average < 90.0 {
            Self::NeedsAttention
        } else {
            Self::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::NeedsAttention => "needs_attention",
            Self::Critical => "critical",
        }
    }
}

/// Totals across the whole audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_files: usize,
    pub critical_issues: usize,
    pub major_issues: usize,
    pub minor_issues: usize,
    /// Mean artifact score, rounded to two decimals
    pub average_freshness_score: f64,
    pub overall_health: OverallHealth,
}

impl ReportSummary {
    fn compute(scorecard: &[FreshnessScore], issues: &[Issue]) -> Self {
        let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();
        let (critical_issues, major_issues, minor_issues) =
            (count(Severity::Critical), count(Severity::Major), count(Severity::Minor));

        let average = if scorecard.is_empty() {
            100.0
        } else {
            let total: f64 = scorecard.iter().map(|s| f64::from(s.score)).sum();
            (total / scorecard.len() as f64 * 100.0).round() / 100.0
        };

        Self {
            total_files: scorecard.len(),
            critical_issues,
            major_issues,
            minor_issues,
            average_freshness_score: average,
            overall_health: OverallHealth::classify(average, critical_issues, major_issues),
        }
    }
}

/// Result of one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub scorecard: Vec<FreshnessScore>,
    pub issues: Vec<Issue>,
    pub patches: Vec<PatchSuggestion>,
    pub recommendations: Vec<Recommendation>,
    pub undocumented: Vec<UndocumentedEntity>,
}

impl AuditReport {
    /// Lowest artifact score, 100 for an empty scorecard
    pub fn lowest_score(&self) -> u32 {
        self.scorecard.iter().map(|s| s.score).min().unwrap_or(100)
    }

    /// Score card entry for one artifact
    pub fn score_for(&self, path: &str) -> Option<&FreshnessScore> {
        self.scorecard.iter().find(|s| s.artifact_path == path)
    }

    pub fn issues_in<'a>(&'a self, category: Category) -> impl Iterator<Item = &'a Issue> + 'a {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn auto_patch_count(&self) -> usize {
        self.patches.iter().filter(|p| p.is_auto()).count()
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Assembles the final report from per-artifact results
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble a report stamped with the current time
    pub fn assemble(
        &self,
        analyses: Vec<ArtifactAnalysis>,
        patches: Vec<PatchSuggestion>,
        undocumented: Vec<UndocumentedEntity>,
    ) -> AuditReport {
        self.assemble_at(analyses, patches, undocumented, Utc::now())
    }

    /// Assemble a report with an explicit timestamp
    pub fn assemble_at(
        &self,
        analyses: Vec<ArtifactAnalysis>,
        mut patches: Vec<PatchSuggestion>,
        mut undocumented: Vec<UndocumentedEntity>,
        generated_at: DateTime<Utc>,
    ) -> AuditReport {
        let mut scorecard = Vec::with_capacity(analyses.len());
        let mut issues = Vec::new();
        for analysis in analyses {
            scorecard.push(analysis.score);
            issues.extend(analysis.issues);
        }

        scorecard.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.artifact_path.cmp(&b.artifact_path)));

        issues.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.target_artifact.cmp(&b.target_artifact))
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.id.cmp(&b.id))
        });

        let position: HashMap<&str, usize> = issues
            .iter()
            .enumerate()
            .map(|(i, issue)| (issue.id.as_str(), i))
            .collect();
        patches.sort_by_key(|p| position.get(p.issue_id.as_str()).copied().unwrap_or(usize::MAX));

        undocumented.sort();

        let recommendations = recommend(&issues, &patches, &undocumented);
        let summary = ReportSummary::compute(&scorecard, &issues);

        AuditReport {
            generated_at,
            summary,
            scorecard,
            issues,
            patches,
            recommendations,
            undocumented,
        }
    }
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn category_advice(category: Category, count: usize) -> String {
    match category {
        Category::MissingParamDoc => format!("Document {} missing parameter(s)", count),
        Category::StaleReference => format!("Remove or update {} stale reference(s)", count),
        Category::StatusMismatch => format!("Correct {} outdated requirement status(es)", count),
        Category::EncodingFailure => format!("Re-encode {} unreadable artifact(s) as UTF-8", count),
        Category::ContractDrift => format!("Bring the interface contract in line with {} route(s)", count),
        Category::TraceabilityGap => format!("Link {} entity(ies) to a requirement", count),
    }
}

fn recommend(
    issues: &[Issue],
    patches: &[PatchSuggestion],
    undocumented: &[UndocumentedEntity],
) -> Vec<Recommendation> {
    let mut clusters: BTreeMap<Category, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        clusters.entry(issue.category).or_default().push(issue);
    }

    let mut recommendations: Vec<Recommendation> = clusters
        .into_iter()
        .map(|(category, members)| Recommendation {
            category: Some(category),
            message: category_advice(category, members.len()),
            artifacts: members
                .iter()
                .map(|i| i.target_artifact.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            issue_ids: members.iter().map(|i| i.id.clone()).collect(),
        })
        .collect();

    let categories: HashMap<&str, Category> = issues.iter().map(|i| (i.id.as_str(), i.category)).collect();
    recommendations.extend(patches.iter().filter(|p| !p.is_auto()).map(|patch| Recommendation {
        category: categories.get(patch.issue_id.as_str()).copied(),
        message: patch.note.clone(),
        artifacts: vec![patch.target_artifact.clone()],
        issue_ids: vec![patch.issue_id.clone()],
    }));

    if !undocumented.is_empty() {
        let names: Vec<&str> = undocumented.iter().map(|u| u.signature.as_str()).collect();
        recommendations.push(Recommendation {
            category: None,
            message: format!(
                "Add documentation for {} undocumented entit{}: {}",
                undocumented.len(),
                if undocumented.len() == 1 { "y" } else { "ies" },
                names.join(", ")
            ),
            artifacts: undocumented
                .iter()
                .map(|u| u.artifact_path.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            issue_ids: Vec::new(),
        });
    }

    recommendations
}
