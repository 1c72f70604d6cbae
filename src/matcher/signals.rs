//! Lexical and structural matching signals
//!
//! Every signal is a value in [0, 1] computed from one (code, doc) pair.

use crate::extract::{contains_word, normalize_route, CodeEntity, CodeKind, DocEntity, DocKind};
use crate::inventory::names_code_exactly;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The four signal values behind a link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub name: f64,
    pub reference: f64,
    /// None when the signature is empty and the signal does not apply
    pub params: Option<f64>,
    pub prior: f64,
}

impl Signals {
    /// Compute all signals for a pair
    pub fn compute(code: &CodeEntity, doc: &DocEntity) -> Self {
        Self {
            name: name_signal(code, doc),
            reference: reference_signal(code, doc),
            params: param_signal(code, doc),
            prior: prior_signal(code, doc),
        }
    }
}

/// Anchor text reduced to something comparable with a qualified name
fn normalize_anchor(section: &str) -> String {
    let mut anchor = section.trim().replace('`', "").to_lowercase();

    // `factorial(n)` and `add()` anchor on the callable name
    if anchor.ends_with(')') {
        if let Some(open) = anchor.find('(') {
            anchor.truncate(open);
        }
    }

    anchor.trim().to_string()
}

/// Name similarity between the doc anchor and the code entity
pub fn name_signal(code: &CodeEntity, doc: &DocEntity) -> f64 {
    let anchor = normalize_anchor(&doc.anchor.section);
    if anchor.is_empty() {
        return 0.0;
    }

    if let Some(route) = code.route_path() {
        if normalize_route(&anchor) == route {
            return 1.0;
        }
    }

    let qualified = code.qualified_name.to_lowercase();
    let short = code.short_name().to_lowercase();

    if anchor == qualified || anchor == short {
        1.0
    } else if !qualified.is_empty() && anchor.contains(&qualified) {
        0.75
    } else if short.len() >= 3 && contains_word(&anchor, &short) {
        0.5
    } else {
        0.0
    }
}

/// 1.0 when the doc declares a reference to the entity by name
pub fn reference_signal(code: &CodeEntity, doc: &DocEntity) -> f64 {
    if doc.declared_references.iter().any(|r| names_code_exactly(r, code)) {
        1.0
    } else {
        0.0
    }
}

/// Fraction of signature parameters the doc mentions
pub fn param_signal(code: &CodeEntity, doc: &DocEntity) -> Option<f64> {
    if code.signature.is_empty() {
        return None;
    }

    let mentioned = code.signature.iter().filter(|p| doc.mentions(&p.name)).count();
    Some(mentioned as f64 / code.signature.len() as f64)
}

/// Whether this kind of doc is expected to describe this kind of code
pub fn prior_signal(code: &CodeEntity, doc: &DocEntity) -> f64 {
    let compatible = match doc.kind {
        DocKind::Narrative | DocKind::RequirementSpec => true,
        DocKind::InterfaceContract => code.kind == CodeKind::Route,
        DocKind::InlineComment => doc.anchor.path == code.location.path,
    };

    if compatible {
        1.0
    } else {
        0.0
    }
}

fn sphinx_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":param[ \t]+(?:[^\s:]+[ \t]+)?(\w+)[ \t]*:").expect("sphinx pattern is valid"))
}

fn jsdoc_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@param[ \t]+(?:\{[^}\n]*\}[ \t]+)?(\w+)").expect("jsdoc pattern is valid"))
}

fn list_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*[-*+][ \t]+`(\w+)`[ \t]*(?:\([^)\n]*\))?[ \t]*:").expect("list pattern is valid")
    })
}

fn section_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[ \t]+(\w+)[ \t]*(?:\([^)\n]*\))?[ \t]*:").expect("section pattern is valid"))
}

/// Parameter names a doc text documents explicitly, in order of appearance
///
/// Recognizes `:param x:`, `@param x`, `` - `x`: `` list items and
/// `Args:` / `Parameters:` sections.
pub fn documented_params(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for re in [sphinx_param_regex(), jsdoc_param_regex(), list_param_regex()] {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    let mut offset = 0;
    let mut section_indent: Option<usize> = None;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        let indent = line.len() - line.trim_start().len();

        match section_indent {
            Some(base) if !trimmed.is_empty() && indent <= base => section_indent = None,
            Some(_) => {
                if let Some(caps) = section_param_regex().captures(line) {
                    if let Some(m) = caps.get(1) {
                        found.push((offset + m.start(), m.as_str().to_string()));
                    }
                }
            }
            None => {}
        }

        if section_indent.is_none()
            && matches!(trimmed, "Args:" | "Arguments:" | "Parameters:" | "Params:")
        {
            section_indent = Some(indent);
        }

        offset += line.len();
    }

    found.sort();
    let mut names: Vec<String> = Vec::new();
    for (_, name) in found {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Parameters a doc documents that the signature does not declare
pub fn stale_params(code: &CodeEntity, doc: &DocEntity) -> Vec<String> {
    documented_params(&doc.content())
        .into_iter()
        .filter(|name| !code.has_param(name))
        .collect()
}
