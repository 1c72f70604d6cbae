//! Normalized entity model and the extractor seam
//!
//! Extractors turn artifacts into entities:
//! - Code entities (functions, routes, classes, modules)
//! - Documentation entities (inline comments, narratives, requirement specs, contracts)
//!
//! Language-specific source parsing lives outside this crate; only the Markdown
//! extractor for documentation ships here.

pub mod code;
pub mod doc;

pub use code::{normalize_route, CodeEntity, CodeKind, Param, SourceLocation};
pub use doc::{Anchor, DocEntity, DocKind, DocReference, DocStatus, MarkdownExtractor, ReferenceScope};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute a stable hash for content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check whether `needle` occurs in `haystack` as a whole identifier word
pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    let is_ident = |c: char| c.is_alphanumeric() || c == '_';

    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, |c| !is_ident(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_ident(c));
        before_ok && after_ok
    })
}

/// Common accessors shared by code and documentation entities
pub trait EntityFacts {
    /// Unique identifier for this entity
    fn id(&self) -> &str;

    /// Path of the artifact this entity was extracted from
    fn artifact_path(&self) -> &str;

    /// Human-readable label used in issue text
    fn label(&self) -> &str;
}

/// A normalized structural fact extracted from an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    Code(CodeEntity),
    Doc(DocEntity),
}

impl Entity {
    pub fn as_code(&self) -> Option<&CodeEntity> {
        match self {
            Entity::Code(code) => Some(code),
            Entity::Doc(_) => None,
        }
    }

    pub fn as_doc(&self) -> Option<&DocEntity> {
        match self {
            Entity::Doc(doc) => Some(doc),
            Entity::Code(_) => None,
        }
    }

    fn facts(&self) -> &dyn EntityFacts {
        match self {
            Entity::Code(code) => code,
            Entity::Doc(doc) => doc,
        }
    }
}

impl EntityFacts for Entity {
    fn id(&self) -> &str {
        self.facts().id()
    }

    fn artifact_path(&self) -> &str {
        self.facts().artifact_path()
    }

    fn label(&self) -> &str {
        self.facts().label()
    }
}

impl From<CodeEntity> for Entity {
    fn from(code: CodeEntity) -> Self {
        Entity::Code(code)
    }
}

impl From<DocEntity> for Entity {
    fn from(doc: DocEntity) -> Self {
        Entity::Doc(doc)
    }
}

/// Kind of artifact as reported by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Source,
    Narrative,
    RequirementSpec,
    InterfaceContract,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Source => write!(f, "source"),
            ArtifactKind::Narrative => write!(f, "narrative"),
            ArtifactKind::RequirementSpec => write!(f, "requirement_spec"),
            ArtifactKind::InterfaceContract => write!(f, "interface_contract"),
        }
    }
}

fn default_decoded() -> bool {
    true
}

/// Extractor output for a single artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedArtifact {
    /// Artifact path relative to the repository root
    pub path: String,
    /// Kind of artifact
    pub kind: ArtifactKind,
    /// Stored artifact text, used to locate patch spans
    #[serde(default)]
    pub content: String,
    /// Entities found in the artifact
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// False when the artifact could not be decoded at all
    #[serde(default = "default_decoded")]
    pub decode_succeeded: bool,
}

impl ExtractedArtifact {
    /// Create a decoded artifact with no entities yet
    pub fn new(path: &str, kind: ArtifactKind, content: &str) -> Self {
        Self {
            path: path.to_string(),
            kind,
            content: content.to_string(),
            entities: Vec::new(),
            decode_succeeded: true,
        }
    }

    /// Create an artifact the extractor could not decode
    pub fn undecodable(path: &str, kind: ArtifactKind) -> Self {
        Self {
            path: path.to_string(),
            kind,
            content: String::new(),
            entities: Vec::new(),
            decode_succeeded: false,
        }
    }

    /// Add an entity
    pub fn with_entity(mut self, entity: impl Into<Entity>) -> Self {
        self.entities.push(entity.into());
        self
    }

    pub fn code_entities(&self) -> impl Iterator<Item = &CodeEntity> {
        self.entities.iter().filter_map(Entity::as_code)
    }

    pub fn doc_entities(&self) -> impl Iterator<Item = &DocEntity> {
        self.entities.iter().filter_map(Entity::as_doc)
    }
}

/// Raw artifact bytes handed to an extractor
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.to_string(),
            bytes: bytes.into(),
        }
    }
}

/// Turns a raw artifact into normalized entities
///
/// Undecodable input is reported through `decode_succeeded`; an `Err` means the
/// extractor itself is broken and aborts the run.
pub trait Extractor: Send + Sync {
    /// Extractor name
    fn name(&self) -> &str;

    /// Whether this extractor handles the given path
    fn supports(&self, path: &str) -> bool;

    /// Extract entities from one artifact
    fn extract(&self, source: &SourceFile) -> Result<ExtractedArtifact>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_word() {
        assert!(contains_word("the value n is required", "n"));
        assert!(contains_word("n: count", "n"));
        assert!(!contains_word("the input number", "n"));
        assert!(!contains_word("compute_n_items", "n"));
        assert!(contains_word("`n`", "n"));
        assert!(!contains_word("anything", ""));
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn test_entity_deserializes_tagged() {
        let json = r#"{
            "entity": "code",
            "id": "calc.py::add",
            "kind": "function",
            "qualified_name": "add",
            "signature": [{"name": "a"}, {"name": "b", "has_default": true}],
            "location": {"path": "calc.py", "line": 3}
        }"#;

        let entity: Entity = serde_json::from_str(json).unwrap();
        let code = entity.as_code().unwrap();
        assert_eq!(code.qualified_name, "add");
        assert_eq!(code.signature.len(), 2);
        assert!(code.signature[1].has_default);
        assert_eq!(entity.artifact_path(), "calc.py");
    }

    #[test]
    fn test_artifact_defaults_to_decoded() {
        let json = r#"{"path": "README.md", "kind": "narrative"}"#;
        let artifact: ExtractedArtifact = serde_json::from_str(json).unwrap();
        assert!(artifact.decode_succeeded);
        assert!(artifact.entities.is_empty());
    }
}
