//! Code entities
//!
//! The normalized form of a code symbol as emitted by a source extractor:
//! - Functions and methods with their ordered signature
//! - HTTP routes
//! - Classes and modules

use super::EntityFacts;
use serde::{Deserialize, Serialize};

/// Kind of code symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    Function,
    Route,
    Class,
    Module,
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeKind::Function => write!(f, "function"),
            CodeKind::Route => write!(f, "route"),
            CodeKind::Class => write!(f, "class"),
            CodeKind::Module => write!(f, "module"),
        }
    }
}

/// A single signature parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type, if any
    #[serde(default)]
    pub type_hint: Option<String>,
    /// Whether the parameter has a default value
    #[serde(default)]
    pub has_default: bool,
}

impl Param {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_hint: None,
            has_default: false,
        }
    }

    pub fn typed(mut self, type_hint: &str) -> Self {
        self.type_hint = Some(type_hint.to_string());
        self
    }

    pub fn defaulted(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// Where a code entity is declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Artifact path relative to repository root
    pub path: String,
    /// 1-indexed declaration line
    pub line: usize,
}

/// A code symbol as seen by the audit engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    /// Unique identifier (path + qualified name)
    pub id: String,
    /// Type of symbol
    pub kind: CodeKind,
    /// Qualified name; the URL path for routes
    pub qualified_name: String,
    /// Ordered parameters
    #[serde(default)]
    pub signature: Vec<Param>,
    /// Declared return type
    #[serde(default)]
    pub return_type: Option<String>,
    /// Attached doc comment or docstring
    #[serde(default)]
    pub attached_doc: Option<String>,
    /// Symbol body, scanned only for open-validation markers
    #[serde(default)]
    pub body: Option<String>,
    /// Declaration site
    pub location: SourceLocation,
}

impl EntityFacts for CodeEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn artifact_path(&self) -> &str {
        &self.location.path
    }

    fn label(&self) -> &str {
        &self.qualified_name
    }
}

impl CodeEntity {
    /// Create a new code entity
    pub fn new(path: &str, qualified_name: &str, kind: CodeKind, line: usize) -> Self {
        Self {
            id: format!("{}::{}", path, qualified_name),
            kind,
            qualified_name: qualified_name.to_string(),
            signature: Vec::new(),
            return_type: None,
            attached_doc: None,
            body: None,
            location: SourceLocation {
                path: path.to_string(),
                line,
            },
        }
    }

    /// Append a parameter
    pub fn with_param(mut self, param: Param) -> Self {
        self.signature.push(param);
        self
    }

    /// Set the attached doc text
    pub fn with_doc(mut self, doc: &str) -> Self {
        self.attached_doc = Some(doc.to_string());
        self
    }

    /// Set the body text
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    /// Set the declared return type
    pub fn with_return_type(mut self, return_type: &str) -> Self {
        self.return_type = Some(return_type.to_string());
        self
    }

    /// Last segment of the qualified name (`Calc.add` -> `add`)
    pub fn short_name(&self) -> &str {
        if self.kind == CodeKind::Route {
            return self.qualified_name.trim_matches('/').rsplit('/').next().unwrap_or("");
        }

        self.qualified_name
            .rsplit(|c| c == '.' || c == ':')
            .find(|s| !s.is_empty())
            .unwrap_or(&self.qualified_name)
    }

    /// Parameters without a default value
    pub fn required_params(&self) -> impl Iterator<Item = &Param> {
        self.signature.iter().filter(|p| !p.has_default)
    }

    /// Whether a parameter with this name exists in the signature
    pub fn has_param(&self, name: &str) -> bool {
        self.signature.iter().any(|p| p.name == name)
    }

    /// Normalized URL path for route entities
    pub fn route_path(&self) -> Option<String> {
        (self.kind == CodeKind::Route).then(|| normalize_route(&self.qualified_name))
    }

    /// Human-readable signature, e.g. `power(base: float, exponent) -> float`
    pub fn display_signature(&self) -> String {
        if self.kind != CodeKind::Function {
            return self.qualified_name.clone();
        }

        let params: Vec<String> = self
            .signature
            .iter()
            .map(|p| match &p.type_hint {
                Some(hint) => format!("{}: {}", p.name, hint),
                None => p.name.clone(),
            })
            .collect();
        let mut rendered = format!("{}({})", self.qualified_name, params.join(", "));
        if let Some(ret) = &self.return_type {
            rendered.push_str(" -> ");
            rendered.push_str(ret);
        }
        rendered
    }

    /// Non-empty attached doc text
    pub fn doc_text(&self) -> Option<&str> {
        self.attached_doc.as_deref().filter(|d| !d.trim().is_empty())
    }

    /// Check attached doc and body for any of the given markers (case-insensitive)
    pub fn has_open_marker(&self, markers: &[String]) -> bool {
        let texts = [self.attached_doc.as_deref(), self.body.as_deref()];
        texts.iter().flatten().any(|text| {
            let lower = text.to_lowercase();
            markers
                .iter()
                .any(|m| !m.is_empty() && lower.contains(&m.to_lowercase()))
        })
    }
}

const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Normalize a route path for comparison
///
/// `GET /Batch/` and `batch` both normalize to `/batch`.
pub fn normalize_route(raw: &str) -> String {
    let mut path = raw.trim().trim_matches('`');

    // Drop a leading HTTP method
    if let Some((method, rest)) = path.split_once(char::is_whitespace) {
        if HTTP_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method)) {
            path = rest.trim();
        }
    }

    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        let method = CodeEntity::new("calc.py", "Calculator.add", CodeKind::Function, 4);
        assert_eq!(method.short_name(), "add");

        let rust_fn = CodeEntity::new("lib.rs", "calc::add", CodeKind::Function, 1);
        assert_eq!(rust_fn.short_name(), "add");

        let route = CodeEntity::new("api.py", "/v1/batch", CodeKind::Route, 10);
        assert_eq!(route.short_name(), "batch");
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("batch"), "/batch");
        assert_eq!(normalize_route("GET /Batch/"), "/batch");
        assert_eq!(normalize_route("`/health`"), "/health");
        assert_eq!(normalize_route("/"), "/");
    }

    #[test]
    fn test_open_marker_detection() {
        let markers = vec!["not yet implemented".to_string()];
        let entity = CodeEntity::new("calc.py", "factorial", CodeKind::Function, 1)
            .with_body("raise NotImplementedError  # Not yet implemented: validate n");
        assert!(entity.has_open_marker(&markers));

        let clean = CodeEntity::new("calc.py", "add", CodeKind::Function, 1).with_body("return a + b");
        assert!(!clean.has_open_marker(&markers));
    }

    #[test]
    fn test_required_params() {
        let entity = CodeEntity::new("calc.py", "_scale", CodeKind::Function, 1)
            .with_param(Param::new("x").typed("float"))
            .with_param(Param::new("factor").defaulted());

        let required: Vec<&str> = entity.required_params().map(|p| p.name.as_str()).collect();
        assert_eq!(required, vec!["x"]);
        assert!(entity.has_param("factor"));
    }

    #[test]
    fn test_display_signature() {
        let power = CodeEntity::new("calc.py", "power", CodeKind::Function, 3)
            .with_param(Param::new("base").typed("float"))
            .with_param(Param::new("exponent"))
            .with_return_type("float");
        assert_eq!(power.display_signature(), "power(base: float, exponent) -> float");

        let reset = CodeEntity::new("calc.py", "reset", CodeKind::Function, 9);
        assert_eq!(reset.display_signature(), "reset()");

        let route = CodeEntity::new("app.py", "/batch", CodeKind::Route, 1).with_return_type("json");
        assert_eq!(route.display_signature(), "/batch");
    }
}
