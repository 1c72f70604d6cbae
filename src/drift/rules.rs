//! Drift detection rules
//!
//! Each rule inspects one target artifact against the shared inventory and
//! match result. Rules are independent of each other and of evaluation order.

use super::{Category, FixHint, Issue, Severity};
use crate::config::RuleConfig;
use crate::extract::{
    contains_word, normalize_route, ArtifactKind, CodeEntity, CodeKind, DocEntity, DocKind,
    DocStatus, ReferenceScope,
};
use crate::inventory::{ArtifactRecord, Inventory};
use crate::matcher::{documented_params, stale_params, MatchResult, Relation};
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Shared read-only state handed to every rule
pub struct RuleContext<'a> {
    pub inventory: &'a Inventory,
    pub matches: &'a MatchResult,
    pub config: &'a RuleConfig,
}

/// Trait for drift detection rules
pub trait DriftRule: Send + Sync {
    /// Rule name
    fn name(&self) -> &str;

    /// Whether the rule still runs on artifacts that failed to decode
    fn runs_on_undecodable(&self) -> bool {
        false
    }

    /// Issues this rule reports against the given artifact
    fn check(&self, artifact: &ArtifactRecord, ctx: &RuleContext) -> Result<Vec<Issue>>;
}

/// Collection of drift rules
pub struct RuleSet {
    rules: Vec<Box<dyn DriftRule>>,
}

impl RuleSet {
    /// Create the default rule set
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ParameterCoverageRule),
                Box::new(StatusConsistencyRule),
                Box::new(ReferenceIntegrityRule),
                Box::new(ContractParityRule),
                Box::new(TraceabilityRule),
                Box::new(EncodingRule),
            ],
        }
    }

    /// Create a rule set from explicit rules
    pub fn with_rules(rules: Vec<Box<dyn DriftRule>>) -> Self {
        Self { rules }
    }

    /// Rules applicable to an artifact
    pub fn applicable<'a>(&'a self, artifact: &'a ArtifactRecord) -> impl Iterator<Item = &'a dyn DriftRule> + 'a {
        self.rules
            .iter()
            .map(|rule| rule.as_ref())
            .filter(move |rule| artifact.decode_succeeded || rule.runs_on_undecodable())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// The only line mentioning `word`, if exactly one does
fn unique_line_mentioning<'t>(lines: impl Iterator<Item = &'t str>, word: &str) -> Option<&'t str> {
    let mut hits = lines.filter(|line| line.contains(word));
    let first = hits.next()?;
    hits.next().is_none().then_some(first)
}

/// Lowercase words of an identifier or type hint (`strictMode`, `max_tokens`, `Optional[Timeout]`)
fn name_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in text.chars() {
        if !c.is_alphanumeric() {
            prev_lower = false;
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Whether `keyword` appears as whole segments, allowing a plural on the last one
fn has_keyword(segments: &[String], keyword: &[String]) -> bool {
    let Some((last, head)) = keyword.split_last() else {
        return false;
    };

    segments.windows(keyword.len()).any(|window| {
        let Some((window_last, window_head)) = window.split_last() else {
            return false;
        };
        window_head == head
            && (window_last == last || window_last.strip_suffix('s') == Some(last.as_str()))
    })
}

fn is_safety_sensitive(name: &str, type_hint: Option<&str>, keywords: &[String]) -> bool {
    let name = name_segments(name);
    let type_hint = name_segments(type_hint.unwrap_or(""));

    keywords.iter().any(|k| {
        let keyword = name_segments(k);
        has_keyword(&name, &keyword) || has_keyword(&type_hint, &keyword)
    })
}

// ==================== Parameter coverage ====================

/// The text a code entity is primarily documented by
struct PrimaryDescription<'a> {
    target: &'a str,
    text: String,
    confidence: f64,
    /// Docstring-style descriptions get `:param` lines, Markdown gets list items
    docstring: bool,
}

/// Detects required parameters missing from an entity's primary description
pub struct ParameterCoverageRule;

impl ParameterCoverageRule {
    fn primary<'a>(code: &'a CodeEntity, ctx: &RuleContext<'a>) -> Option<PrimaryDescription<'a>> {
        if let Some(text) = code.doc_text() {
            return Some(PrimaryDescription {
                target: &code.location.path,
                text: text.to_string(),
                confidence: 0.95,
                docstring: true,
            });
        }

        let link = ctx.matches.best_describing(&code.id)?;
        let doc = ctx.inventory.doc(&link.doc_entity_id)?;
        Some(PrimaryDescription {
            target: &doc.anchor.path,
            text: doc.content(),
            confidence: link.match_confidence,
            docstring: doc.kind == DocKind::InlineComment,
        })
    }

    fn param_line(name: &str, type_hint: Option<&str>, docstring: bool) -> String {
        match (docstring, type_hint) {
            (true, Some(t)) => format!(":param {}: ({}) Description pending.", name, t),
            (true, None) => format!(":param {}: Description pending.", name),
            (false, Some(t)) => format!("- `{}` ({}): Description pending.", name, t),
            (false, None) => format!("- `{}`: Description pending.", name),
        }
    }

    fn missing_params(code: &CodeEntity, artifact: &ArtifactRecord, ctx: &RuleContext) -> Vec<Issue> {
        let primary = match Self::primary(code, ctx) {
            Some(p) if p.target == artifact.path => p,
            _ => return Vec::new(),
        };

        code.required_params()
            .filter(|param| !contains_word(&primary.text, &param.name))
            .map(|param| {
                let type_hint = param.type_hint.as_deref();
                let severity = if is_safety_sensitive(&param.name, type_hint, &ctx.config.safety_keywords) {
                    Severity::Major
                } else {
                    Severity::Minor
                };

                Issue::new(
                    Category::MissingParamDoc,
                    severity,
                    &artifact.path,
                    &format!("{}:{}", code.id, param.name),
                    primary.confidence,
                )
                .with_entity(&code.id)
                .with_details(
                    &format!("Parameter `{}` of `{}` is documented", param.name, code.qualified_name),
                    &format!("The description of `{}` never mentions `{}`", code.qualified_name, param.name),
                    "Callers cannot tell what the parameter does or which values are accepted",
                )
                .with_fix(FixHint::AppendParam {
                    description: primary.text.clone(),
                    line: Self::param_line(&param.name, type_hint, primary.docstring),
                })
            })
            .collect()
    }

    fn stale_issue(code: &CodeEntity, artifact: &ArtifactRecord, text: &str, name: &str, confidence: f64) -> Issue {
        let mut issue = Issue::new(
            Category::StaleReference,
            Severity::Minor,
            &artifact.path,
            &format!("{}:param:{}", code.id, name),
            confidence,
        )
        .with_entity(&code.id)
        .with_details(
            &format!("Only parameters of `{}` are documented", code.qualified_name),
            &format!("`{}` is documented but the signature has no such parameter", name),
            "Readers will pass an argument the code no longer accepts",
        );

        let documenting = text.lines().filter(|line| documented_params(line).iter().any(|p| p == name));
        if let Some(line) = unique_line_mentioning(documenting, name) {
            issue = issue.with_fix(FixHint::RemoveLine {
                line: line.to_string(),
                reference: name.to_string(),
            });
        }

        issue
    }

    fn stale_documented(code: &CodeEntity, artifact: &ArtifactRecord, ctx: &RuleContext) -> Vec<Issue> {
        let mut issues = Vec::new();

        if code.location.path == artifact.path {
            if let Some(text) = code.doc_text() {
                for name in documented_params(text).iter().filter(|n| !code.has_param(n)) {
                    issues.push(Self::stale_issue(code, artifact, text, name, 0.95));
                }
            }
        }

        for link in ctx.matches.links_for_code(&code.id) {
            if link.relation != Relation::Contradicts {
                continue;
            }
            let Some(doc) = ctx.inventory.doc(&link.doc_entity_id) else {
                continue;
            };
            if doc.anchor.path != artifact.path {
                continue;
            }

            let text = doc.content();
            for name in stale_params(code, doc) {
                issues.push(Self::stale_issue(code, artifact, &text, &name, link.match_confidence));
            }
        }

        issues
    }
}

impl DriftRule for ParameterCoverageRule {
    fn name(&self) -> &str {
        "parameter_coverage"
    }

    fn check(&self, artifact: &ArtifactRecord, ctx: &RuleContext) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        for code in ctx.inventory.code_entities() {
            issues.extend(Self::missing_params(code, artifact, ctx));
            issues.extend(Self::stale_documented(code, artifact, ctx));
        }
        Ok(issues)
    }
}

// ==================== Status consistency ====================

/// Detects requirement specs whose declared status disagrees with the code
pub struct StatusConsistencyRule;

impl StatusConsistencyRule {
    /// Status implied by the code a requirement maps to, None when nothing maps
    fn actual_status(doc: &DocEntity, ctx: &RuleContext) -> Option<DocStatus> {
        let mut mapped: BTreeMap<&str, &CodeEntity> = BTreeMap::new();

        for link in ctx.matches.links_for_doc(&doc.id) {
            if link.relation.is_describing() {
                if let Some(code) = ctx.inventory.code(&link.code_entity_id) {
                    mapped.insert(&code.id, code);
                }
            }
        }

        let mut missing = 0;
        let mut resolved = 0;
        for reference in &doc.declared_references {
            if ctx.inventory.resolves(reference) {
                resolved += 1;
                for code in ctx.inventory.code_named(reference) {
                    mapped.insert(&code.id, code);
                }
            } else {
                missing += 1;
            }
        }

        if mapped.is_empty() && doc.declared_references.is_empty() {
            return None;
        }

        let status = if mapped.is_empty() && resolved == 0 {
            DocStatus::Planned
        } else if missing > 0 || mapped.values().any(|c| c.has_open_marker(&ctx.config.open_markers)) {
            DocStatus::Partial
        } else {
            DocStatus::Implemented
        };

        Some(status)
    }
}

impl DriftRule for StatusConsistencyRule {
    fn name(&self) -> &str {
        "status_consistency"
    }

    fn check(&self, artifact: &ArtifactRecord, ctx: &RuleContext) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();

        for doc in ctx.inventory.docs_in(&artifact.path) {
            if doc.kind != DocKind::RequirementSpec {
                continue;
            }
            let Some(declared) = doc.declared_status else {
                continue;
            };
            let Some(actual) = Self::actual_status(doc, ctx) else {
                continue;
            };
            if declared == actual {
                continue;
            }

            let mut issue = Issue::new(
                Category::StatusMismatch,
                Severity::Major,
                &artifact.path,
                &doc.id,
                0.85,
            )
            .with_entity(&doc.id)
            .with_details(
                &format!("`{}` is marked {}", doc.anchor.section, actual),
                &format!("`{}` is marked {}", doc.anchor.section, declared),
                "Planning and release decisions rely on an outdated implementation status",
            );

            if let Some(line) = doc.status_line() {
                issue = issue.with_fix(FixHint::ReplaceStatus {
                    line: line.to_string(),
                    from: declared,
                    to: actual,
                });
            }

            issues.push(issue);
        }

        Ok(issues)
    }
}

// ==================== Reference integrity ====================

/// Detects documentation that names modules or symbols that do not exist
pub struct ReferenceIntegrityRule;

impl DriftRule for ReferenceIntegrityRule {
    fn name(&self) -> &str {
        "reference_integrity"
    }

    fn check(&self, artifact: &ArtifactRecord, ctx: &RuleContext) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();

        for dangling in ctx.matches.dangling_in(&artifact.path) {
            let reference = &dangling.reference;
            let (severity, what) = match reference.scope {
                ReferenceScope::Module => (Severity::Major, "module"),
                ReferenceScope::Symbol => (Severity::Minor, "symbol"),
            };

            let mut issue = Issue::new(
                Category::StaleReference,
                severity,
                &artifact.path,
                &format!("{}:{}", dangling.doc_entity_id, reference.name),
                0.9,
            )
            .with_entity(&dangling.doc_entity_id)
            .with_details(
                &format!("Every referenced {} exists", what),
                &format!("`{}` does not exist in the codebase", reference.name),
                "Readers are sent to code that is gone",
            );

            if let Some(doc) = ctx.inventory.doc(&dangling.doc_entity_id) {
                if let Some(line) = unique_line_mentioning(doc.lines(), &reference.name) {
                    issue = issue.with_fix(FixHint::RemoveLine {
                        line: line.to_string(),
                        reference: reference.name.clone(),
                    });
                }
            }

            issues.push(issue);
        }

        Ok(issues)
    }
}

// ==================== Contract parity ====================

fn response_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?im)^\s*(?:[-*]\s*)?['"`]?(?:[1-5][0-9]{2}|[1-5]XX|default)\b"#)
            .expect("response pattern is valid")
    })
}

/// Detects routes that their interface contract omits or describes without responses
pub struct ContractParityRule;

impl ContractParityRule {
    fn enumerates(doc: &DocEntity, route: &str) -> bool {
        normalize_route(&doc.anchor.section) == route
            || doc
                .declared_references
                .iter()
                .any(|r| r.name.starts_with('/') && normalize_route(&r.name) == route)
    }

    fn has_responses(doc: &DocEntity) -> bool {
        doc.content_blocks.iter().any(|b| response_regex().is_match(b))
    }

    /// Route a contract entry is anchored on (`POST /calculate`, `/health`)
    fn anchored_route(doc: &DocEntity) -> Option<String> {
        let anchor = doc.anchor.section.trim().trim_matches('`');
        let path = match anchor.split_whitespace().collect::<Vec<_>>().as_slice() {
            [path] => *path,
            [method, path] if method.chars().all(|c| c.is_ascii_alphabetic()) => *path,
            _ => return None,
        };

        path.starts_with('/').then(|| normalize_route(path))
    }

    /// Contract entries in this artifact whose route has no implementation
    fn unimplemented(artifact: &ArtifactRecord, ctx: &RuleContext) -> Vec<Issue> {
        if ctx.inventory.code_entities().is_empty() {
            return Vec::new();
        }

        ctx.inventory
            .docs_in(&artifact.path)
            .filter(|d| d.kind == DocKind::InterfaceContract)
            .filter_map(|doc| {
                let route = Self::anchored_route(doc)?;
                if ctx.inventory.has_route(&route) {
                    return None;
                }

                let issue = Issue::new(
                    Category::ContractDrift,
                    Severity::Major,
                    &artifact.path,
                    &doc.id,
                    0.9,
                )
                .with_entity(&doc.id)
                .with_details(
                    &format!("`{}` is served by a route in the codebase", doc.anchor.section),
                    &format!("No route implements `{}`", route),
                    "Clients will call an endpoint that does not exist",
                );
                Some(issue)
            })
            .collect()
    }
}

impl DriftRule for ContractParityRule {
    fn name(&self) -> &str {
        "contract_parity"
    }

    fn check(&self, artifact: &ArtifactRecord, ctx: &RuleContext) -> Result<Vec<Issue>> {
        if artifact.kind != ArtifactKind::InterfaceContract {
            return Ok(Vec::new());
        }

        let Some(first_contract) = ctx.inventory.contract_artifacts().next() else {
            return Ok(Vec::new());
        };

        let contract_docs: Vec<&DocEntity> = ctx
            .inventory
            .doc_entities()
            .iter()
            .filter(|d| d.kind == DocKind::InterfaceContract)
            .collect();

        let mut issues = Vec::new();
        for code in ctx.inventory.code_entities() {
            let Some(route) = code.route_path() else {
                continue;
            };

            let enumerating: Vec<&DocEntity> = contract_docs
                .iter()
                .copied()
                .filter(|d| Self::enumerates(d, &route))
                .collect();

            let issue = match enumerating.first() {
                None if first_contract.path == artifact.path => Issue::new(
                    Category::ContractDrift,
                    Severity::Major,
                    &artifact.path,
                    &code.id,
                    0.9,
                )
                .with_details(
                    &format!("Route `{}` is described by the interface contract", code.qualified_name),
                    &format!("No contract entry enumerates `{}`", route),
                    "API consumers cannot discover or validate this endpoint",
                ),
                Some(doc)
                    if doc.anchor.path == artifact.path
                        && !enumerating.iter().any(|d| Self::has_responses(d)) =>
                {
                    Issue::new(
                        Category::ContractDrift,
                        Severity::Major,
                        &artifact.path,
                        &code.id,
                        0.8,
                    )
                    .with_details(
                        &format!("Contract entry for `{}` defines its responses", route),
                        &format!("`{}` lists the route without any response definition", doc.anchor.section),
                        "Clients cannot rely on the documented response shape",
                    )
                }
                _ => continue,
            };

            issues.push(issue.with_entity(&code.id));
        }

        issues.extend(Self::unimplemented(artifact, ctx));
        Ok(issues)
    }
}

// ==================== Traceability ====================

/// Detects routes and functions with no requirement tracing to them
pub struct TraceabilityRule;

impl DriftRule for TraceabilityRule {
    fn name(&self) -> &str {
        "traceability"
    }

    fn check(&self, artifact: &ArtifactRecord, ctx: &RuleContext) -> Result<Vec<Issue>> {
        if !ctx.inventory.has_requirement_convention() {
            return Ok(Vec::new());
        }

        let issues = ctx
            .inventory
            .code_in(&artifact.path)
            .filter(|c| matches!(c.kind, CodeKind::Route | CodeKind::Function))
            .filter(|c| !ctx.inventory.is_traced(c))
            .map(|code| {
                Issue::new(
                    Category::TraceabilityGap,
                    Severity::Minor,
                    &artifact.path,
                    &code.id,
                    0.7,
                )
                .with_entity(&code.id)
                .with_details(
                    &format!("`{}` is traced to a requirement", code.qualified_name),
                    "No requirement references this entity",
                    "Behavior without a requirement cannot be verified or prioritized",
                )
            })
            .collect();

        Ok(issues)
    }
}

// ==================== Extraction integrity ====================

/// Reports artifacts the extractor could not decode
pub struct EncodingRule;

impl DriftRule for EncodingRule {
    fn name(&self) -> &str {
        "extraction_integrity"
    }

    fn runs_on_undecodable(&self) -> bool {
        true
    }

    fn check(&self, artifact: &ArtifactRecord, _ctx: &RuleContext) -> Result<Vec<Issue>> {
        if artifact.decode_succeeded {
            return Ok(Vec::new());
        }

        let issue = Issue::new(
            Category::EncodingFailure,
            Severity::Critical,
            &artifact.path,
            "",
            0.2,
        )
        .with_details(
            &format!("{} artifact decodes cleanly", artifact.kind),
            "The artifact could not be decoded; nothing in it was audited",
            "Any drift inside this artifact is invisible",
        );

        Ok(vec![issue])
    }
}
