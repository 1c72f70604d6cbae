//! Main drift analysis engine
//!
//! Coordinates per-artifact analysis:
//! - Rule evaluation against the shared inventory and match result
//! - Issue deduplication and suppression
//! - Freshness scoring

use super::{score_artifact, Category, FreshnessScore, Issue, RuleContext, RuleSet};
use crate::config::{AuditConfig, RuleConfig, ScoringConfig};
use crate::inventory::{ArtifactRecord, Inventory};
use crate::matcher::MatchResult;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Issues and score for one artifact
#[derive(Debug, Clone)]
pub struct ArtifactAnalysis {
    pub path: String,
    /// Issues targeting this artifact, ordered by id
    pub issues: Vec<Issue>,
    pub score: FreshnessScore,
}

/// Main drift analysis engine
pub struct DriftAnalyzer {
    rules: RuleSet,
    rule_config: RuleConfig,
    scoring: ScoringConfig,
}

impl DriftAnalyzer {
    /// Create an analyzer with the default rule set
    pub fn new(config: &AuditConfig) -> Self {
        Self::with_rules(config, RuleSet::new())
    }

    /// Create an analyzer with a custom rule set
    pub fn with_rules(config: &AuditConfig, rules: RuleSet) -> Self {
        Self {
            rules,
            rule_config: config.rules.clone(),
            scoring: config.scoring.clone(),
        }
    }

    /// Analyze every artifact in the inventory, ordered by path
    pub fn analyze(&self, inventory: &Inventory, matches: &MatchResult) -> Vec<ArtifactAnalysis> {
        let ctx = RuleContext {
            inventory,
            matches,
            config: &self.rule_config,
        };

        let artifacts: Vec<&ArtifactRecord> = inventory.artifacts().collect();
        artifacts
            .par_iter()
            .map(|artifact| self.analyze_artifact(artifact, &ctx))
            .collect()
    }

    /// Analyze one artifact
    pub fn analyze_artifact(&self, artifact: &ArtifactRecord, ctx: &RuleContext) -> ArtifactAnalysis {
        let mut by_id: BTreeMap<String, Issue> = BTreeMap::new();

        for rule in self.rules.applicable(artifact) {
            match rule.check(artifact, ctx) {
                Ok(found) => {
                    for issue in found.into_iter().filter(|i| i.target_artifact == artifact.path) {
                        by_id.entry(issue.id.clone()).or_insert(issue);
                    }
                }
                Err(e) => {
                    tracing::warn!("Rule {} skipped for {}: {}", rule.name(), artifact.path, e);
                }
            }
        }

        let mut issues: Vec<Issue> = by_id.into_values().collect();

        // An undecodable artifact reports nothing but its encoding failure
        if issues.iter().any(|i| i.category == Category::EncodingFailure) {
            issues.retain(|i| i.category == Category::EncodingFailure);
        }

        let score = score_artifact(&artifact.path, &issues, &self.scoring);

        tracing::debug!(
            "Analyzed {}: {} issues, score {}",
            artifact.path,
            issues.len(),
            score.score
        );

        ArtifactAnalysis {
            path: artifact.path.clone(),
            issues,
            score,
        }
    }
}

impl Default for DriftAnalyzer {
    fn default() -> Self {
        Self::new(&AuditConfig::default())
    }
}
