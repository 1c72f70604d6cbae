//! Entity matching
//!
//! Links code entities to documentation entities across the whole inventory:
//! - Weighted lexical/structural signals decide whether a pair is linked
//! - Deterministic ranking picks the best doc per code entity
//! - Declared references that resolve to nothing become dangling facts

pub mod signals;

pub use signals::{documented_params, stale_params, Signals};

use crate::config::MatchingConfig;
use crate::extract::{CodeEntity, DocEntity, DocKind, DocReference};
use crate::inventory::Inventory;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

const EPSILON: f64 = 1e-9;

/// How a doc entity relates to a code entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Describes,
    References,
    Contradicts,
}

impl Relation {
    /// Whether the doc claims to describe the entity
    pub fn is_describing(&self) -> bool {
        matches!(self, Relation::Describes | Relation::Contradicts)
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Describes => write!(f, "describes"),
            Relation::References => write!(f, "references"),
            Relation::Contradicts => write!(f, "contradicts"),
        }
    }
}

/// A scored link between a code entity and a doc entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLink {
    pub code_entity_id: String,
    pub doc_entity_id: String,
    pub relation: Relation,
    pub match_confidence: f64,
    pub signals: Signals,
}

/// A declared reference that names nothing in the inventory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    pub doc_entity_id: String,
    pub artifact_path: String,
    pub reference: DocReference,
}

/// Everything the matcher learned about the inventory
#[derive(Debug, Default)]
pub struct MatchResult {
    links: Vec<EntityLink>,
    by_code: HashMap<String, Vec<usize>>,
    by_doc: HashMap<String, Vec<usize>>,
    undocumented: Vec<String>,
    dangling: Vec<DanglingReference>,
}

impl MatchResult {
    /// All links, grouped by code entity id, best first within a group
    pub fn links(&self) -> &[EntityLink] {
        &self.links
    }

    /// Links for one code entity, best first
    pub fn links_for_code<'a>(&'a self, code_id: &str) -> impl Iterator<Item = &'a EntityLink> + 'a {
        self.by_code
            .get(code_id)
            .into_iter()
            .flatten()
            .map(move |i| &self.links[*i])
    }

    /// Links for one doc entity, ordered by code entity id
    pub fn links_for_doc<'a>(&'a self, doc_id: &str) -> impl Iterator<Item = &'a EntityLink> + 'a {
        self.by_doc
            .get(doc_id)
            .into_iter()
            .flatten()
            .map(move |i| &self.links[*i])
    }

    /// Highest-ranked doc for a code entity
    pub fn best_doc(&self, code_id: &str) -> Option<&EntityLink> {
        self.links_for_code(code_id).next()
    }

    /// Highest-ranked doc that describes (or contradicts) a code entity
    pub fn best_describing(&self, code_id: &str) -> Option<&EntityLink> {
        self.links_for_code(code_id).find(|l| l.relation.is_describing())
    }

    /// Code entity ids with neither an attached doc nor any link
    pub fn undocumented(&self) -> &[String] {
        &self.undocumented
    }

    /// All dangling references, ordered by doc id
    pub fn dangling(&self) -> &[DanglingReference] {
        &self.dangling
    }

    /// Dangling references declared inside one artifact
    pub fn dangling_in<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a DanglingReference> + 'a {
        self.dangling.iter().filter(move |d| d.artifact_path == path)
    }
}

/// Scores (code, doc) pairs and keeps the ones above threshold
pub struct EntityMatcher {
    config: MatchingConfig,
}

impl EntityMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Match every code entity against every doc entity
    pub fn match_all(&self, inventory: &Inventory) -> MatchResult {
        let docs = inventory.doc_entities();

        let per_code: Vec<(&CodeEntity, Vec<EntityLink>)> = inventory
            .code_entities()
            .par_iter()
            .map(|code| {
                let mut ranked: Vec<(EntityLink, &DocEntity)> = docs
                    .iter()
                    .filter_map(|doc| self.link(code, doc).map(|link| (link, doc)))
                    .collect();
                ranked.sort_by(|a, b| rank(a, b));
                (code, ranked.into_iter().map(|(link, _)| link).collect())
            })
            .collect();

        let mut result = MatchResult::default();
        for (code, links) in per_code {
            if links.is_empty() && code.doc_text().is_none() {
                result.undocumented.push(code.id.clone());
            }

            for link in links {
                let index = result.links.len();
                result.by_code.entry(link.code_entity_id.clone()).or_default().push(index);
                result.by_doc.entry(link.doc_entity_id.clone()).or_default().push(index);
                result.links.push(link);
            }
        }

        let mut dangling: Vec<DanglingReference> = docs
            .par_iter()
            .flat_map_iter(|doc| {
                doc.declared_references
                    .iter()
                    .filter(|r| !inventory.resolves(r))
                    .map(|r| DanglingReference {
                        doc_entity_id: doc.id.clone(),
                        artifact_path: doc.anchor.path.clone(),
                        reference: r.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        dangling.sort();
        result.dangling = dangling;

        tracing::debug!(
            "Matched {} links, {} undocumented entities, {} dangling references",
            result.links.len(),
            result.undocumented.len(),
            result.dangling.len()
        );

        result
    }

    /// Score one pair, returning a link when it clears the threshold
    pub fn link(&self, code: &CodeEntity, doc: &DocEntity) -> Option<EntityLink> {
        let signals = Signals::compute(code, doc);
        let attached = is_attached(code, doc);

        let confidence = if attached {
            1.0
        } else {
            let score = self.combine(&signals);
            if score + EPSILON < self.config.link_threshold {
                return None;
            }
            round4(score)
        };

        let describing = attached || signals.name + EPSILON >= 0.75;
        let relation = if describing && !stale_params(code, doc).is_empty() {
            Relation::Contradicts
        } else if describing {
            Relation::Describes
        } else {
            Relation::References
        };

        Some(EntityLink {
            code_entity_id: code.id.clone(),
            doc_entity_id: doc.id.clone(),
            relation,
            match_confidence: confidence,
            signals,
        })
    }

    /// Weighted mean over the applicable signals
    fn combine(&self, signals: &Signals) -> f64 {
        let c = &self.config;
        let mut total = c.name_weight * signals.name
            + c.reference_weight * signals.reference
            + c.prior_weight * signals.prior;
        let mut weight = c.name_weight + c.reference_weight + c.prior_weight;

        if let Some(params) = signals.params {
            total += c.param_weight * params;
            weight += c.param_weight;
        }

        if weight <= 0.0 {
            0.0
        } else {
            (total / weight).clamp(0.0, 1.0)
        }
    }
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self::new(MatchingConfig::default())
    }
}

/// Inline comments sitting on the entity's declaration line
fn is_attached(code: &CodeEntity, doc: &DocEntity) -> bool {
    doc.kind == DocKind::InlineComment
        && doc.anchor.path == code.location.path
        && doc.anchor.line == Some(code.location.line)
}

/// Confidence desc, specificity desc, ordinal asc, doc id asc
fn rank(a: &(EntityLink, &DocEntity), b: &(EntityLink, &DocEntity)) -> Ordering {
    b.0.match_confidence
        .total_cmp(&a.0.match_confidence)
        .then_with(|| b.1.kind.specificity().cmp(&a.1.kind.specificity()))
        .then_with(|| a.1.anchor.ordinal.cmp(&b.1.anchor.ordinal))
        .then_with(|| a.1.id.cmp(&b.1.id))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::extract::{ArtifactKind, CodeKind, DocStatus, ExtractedArtifact, Param};

    fn inventory(artifacts: Vec<ExtractedArtifact>) -> Inventory {
        Inventory::build(artifacts, &RuleConfig::default()).unwrap()
    }

    #[test]
    fn test_requirement_links_describe() {
        let inv = inventory(vec![ExtractedArtifact::new("calculator.py", ArtifactKind::Source, "")
            .with_entity(
                CodeEntity::new("calculator.py", "factorial", CodeKind::Function, 1)
                    .with_param(Param::new("n")),
            )
            .with_entity(
                DocEntity::new("calculator.py", DocKind::RequirementSpec, "factorial", 0)
                    .with_block("Status: Implemented")
                    .with_reference(DocReference::symbol("factorial"))
                    .with_status(DocStatus::Implemented),
            )]);

        let result = EntityMatcher::default().match_all(&inv);
        let best = result.best_doc("calculator.py::factorial").unwrap();
        assert_eq!(best.relation, Relation::Describes);
        assert_eq!(best.match_confidence, 0.8);
        assert!(result.undocumented().is_empty());
    }

    #[test]
    fn test_attached_inline_comment_bypasses_scoring() {
        let inv = inventory(vec![ExtractedArtifact::new("calc.py", ArtifactKind::Source, "")
            .with_entity(CodeEntity::new("calc.py", "add", CodeKind::Function, 4))
            .with_entity(DocEntity::new("calc.py", DocKind::InlineComment, "sum helper", 0).at_line(4))]);

        let result = EntityMatcher::default().match_all(&inv);
        let best = result.best_doc("calc.py::add").unwrap();
        assert_eq!(best.match_confidence, 1.0);
        assert_eq!(best.relation, Relation::Describes);
    }

    #[test]
    fn test_contradicting_doc() {
        let inv = inventory(vec![
            ExtractedArtifact::new("calc.py", ArtifactKind::Source, "").with_entity(
                CodeEntity::new("calc.py", "add", CodeKind::Function, 4)
                    .with_param(Param::new("a"))
                    .with_param(Param::new("b")),
            ),
            ExtractedArtifact::new("README.md", ArtifactKind::Narrative, "").with_entity(
                DocEntity::new("README.md", DocKind::Narrative, "add()", 0)
                    .with_block("- `a`: left\n- `b`: right\n- `c`: legacy"),
            ),
        ]);

        let result = EntityMatcher::default().match_all(&inv);
        let link = result.best_describing("calc.py::add").unwrap();
        assert_eq!(link.relation, Relation::Contradicts);
        assert_eq!(result.links_for_doc("README.md#add()").count(), 1);
    }

    #[test]
    fn test_weak_pairs_are_dropped() {
        let inv = inventory(vec![
            ExtractedArtifact::new("calc.py", ArtifactKind::Source, "").with_entity(
                CodeEntity::new("calc.py", "add", CodeKind::Function, 4).with_param(Param::new("a")),
            ),
            ExtractedArtifact::new("README.md", ArtifactKind::Narrative, "")
                .with_entity(DocEntity::new("README.md", DocKind::Narrative, "Installation", 0)),
        ]);

        let result = EntityMatcher::default().match_all(&inv);
        assert!(result.links().is_empty());
        assert_eq!(result.undocumented(), &["calc.py::add".to_string()]);
    }

    #[test]
    fn test_tie_break_prefers_specific_kind() {
        let inv = inventory(vec![
            ExtractedArtifact::new("api.py", ArtifactKind::Source, "")
                .with_entity(CodeEntity::new("api.py", "/health", CodeKind::Route, 3)),
            ExtractedArtifact::new("README.md", ArtifactKind::Narrative, "")
                .with_entity(DocEntity::new("README.md", DocKind::Narrative, "/health", 0)),
            ExtractedArtifact::new("openapi.md", ArtifactKind::InterfaceContract, "")
                .with_entity(DocEntity::new("openapi.md", DocKind::InterfaceContract, "GET /health", 4)),
        ]);

        let result = EntityMatcher::default().match_all(&inv);
        let best = result.best_doc("api.py::/health").unwrap();
        assert_eq!(best.doc_entity_id, "openapi.md#GET /health");
    }

    #[test]
    fn test_dangling_references() {
        let inv = inventory(vec![ExtractedArtifact::new("README.md", ArtifactKind::Narrative, "")
            .with_entity(
                DocEntity::new("README.md", DocKind::Narrative, "Modules", 0)
                    .with_reference(DocReference::module("legacy_utils.py"))
                    .with_reference(DocReference::module("README.md")),
            )]);

        let result = EntityMatcher::default().match_all(&inv);
        assert_eq!(result.dangling().len(), 1);
        assert_eq!(result.dangling()[0].reference.name, "legacy_utils.py");
        assert_eq!(result.dangling_in("README.md").count(), 1);
    }
}
