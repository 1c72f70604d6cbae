//! Documentation entities and the Markdown extractor
//!
//! Splits Markdown documents by heading hierarchy; each section becomes a
//! DocEntity carrying its text blocks, declared references, and status tag.

use super::{contains_word, ArtifactKind, EntityFacts, ExtractedArtifact, Extractor, SourceFile};
use crate::config::{compile_patterns, DocConfig};
use anyhow::Result;
use globset::GlobSet;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

/// Kind of documentation artifact a DocEntity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    InlineComment,
    Narrative,
    RequirementSpec,
    InterfaceContract,
}

impl DocKind {
    /// Rank used for tie-breaking; higher is more specific
    pub fn specificity(&self) -> u8 {
        match self {
            DocKind::InlineComment => 3,
            DocKind::InterfaceContract => 2,
            DocKind::RequirementSpec => 1,
            DocKind::Narrative => 0,
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocKind::InlineComment => write!(f, "inline_comment"),
            DocKind::Narrative => write!(f, "narrative"),
            DocKind::RequirementSpec => write!(f, "requirement_spec"),
            DocKind::InterfaceContract => write!(f, "interface_contract"),
        }
    }
}

/// Implementation status declared by a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    Planned,
    Partial,
    Implemented,
}

impl DocStatus {
    /// Parse a status word
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_lowercase().as_str() {
            "planned" => Some(DocStatus::Planned),
            "partial" | "partially" => Some(DocStatus::Partial),
            "implemented" => Some(DocStatus::Implemented),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Planned => "Planned",
            DocStatus::Partial => "Partial",
            DocStatus::Implemented => "Implemented",
        }
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a reference names a whole module/file or a single symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceScope {
    Module,
    Symbol,
}

/// A name mentioned by a documentation entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocReference {
    pub name: String,
    pub scope: ReferenceScope,
}

const FILE_EXTENSIONS: [&str; 22] = [
    "py", "rs", "md", "js", "ts", "tsx", "jsx", "json", "yaml", "yml", "toml", "txt", "cfg",
    "ini", "go", "java", "rb", "sh", "rst", "html", "css", "sql",
];

impl DocReference {
    pub fn module(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: ReferenceScope::Module,
        }
    }

    pub fn symbol(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: ReferenceScope::Symbol,
        }
    }

    /// Classify a backticked span as a reference, if it looks like one
    ///
    /// `name()` and `/route` are symbols; `file.py` and `dir/` are modules.
    pub fn classify(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains(char::is_whitespace) {
            return None;
        }

        let path_chars = |s: &str| {
            s.chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-' | ':'))
        };

        if let Some(name) = raw.strip_suffix("()") {
            let is_ident = !name.is_empty()
                && name.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':'));
            return is_ident.then(|| Self::symbol(name));
        }

        if raw.len() > 1 && raw.starts_with('/') {
            let is_route = raw
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '/' | '-' | '{' | '}' | '.' | ':'));
            return is_route.then(|| Self::symbol(raw));
        }

        if !path_chars(raw) {
            return None;
        }

        if raw.len() > 1 && raw.ends_with('/') {
            return Some(Self::module(raw));
        }

        match raw.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && FILE_EXTENSIONS.contains(&ext) => {
                Some(Self::module(raw))
            }
            _ => None,
        }
    }
}

/// Where a doc entity sits inside its artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// Section heading, contract path, or symbol an inline comment is attached to
    pub section: String,
    /// Artifact path relative to repository root
    pub path: String,
    /// 1-indexed line of the anchor
    #[serde(default)]
    pub line: Option<usize>,
    /// Position of the entity within its artifact
    #[serde(default)]
    pub ordinal: usize,
}

/// A documentation claim as seen by the audit engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocEntity {
    /// Unique identifier (path + anchor)
    pub id: String,
    /// Kind of documentation
    pub kind: DocKind,
    /// Location inside the artifact
    pub anchor: Anchor,
    /// Ordered text blocks
    #[serde(default)]
    pub content_blocks: Vec<String>,
    /// Names this entity mentions explicitly
    #[serde(default)]
    pub declared_references: BTreeSet<DocReference>,
    /// Declared implementation status
    #[serde(default)]
    pub declared_status: Option<DocStatus>,
    /// Declared version tag
    #[serde(default)]
    pub version_tag: Option<String>,
}

impl EntityFacts for DocEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn artifact_path(&self) -> &str {
        &self.anchor.path
    }

    fn label(&self) -> &str {
        &self.anchor.section
    }
}

impl DocEntity {
    /// Create a new doc entity
    pub fn new(path: &str, kind: DocKind, section: &str, ordinal: usize) -> Self {
        Self {
            id: format!("{}#{}", path, section),
            kind,
            anchor: Anchor {
                section: section.to_string(),
                path: path.to_string(),
                line: None,
                ordinal,
            },
            content_blocks: Vec::new(),
            declared_references: BTreeSet::new(),
            declared_status: None,
            version_tag: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.anchor.line = Some(line);
        self
    }

    pub fn with_block(mut self, block: &str) -> Self {
        self.content_blocks.push(block.to_string());
        self
    }

    pub fn with_reference(mut self, reference: DocReference) -> Self {
        self.declared_references.insert(reference);
        self
    }

    pub fn with_status(mut self, status: DocStatus) -> Self {
        self.declared_status = Some(status);
        self
    }

    /// Full text of all blocks
    pub fn content(&self) -> String {
        self.content_blocks.join("\n\n")
    }

    /// Whether the content mentions `word` as a whole identifier
    pub fn mentions(&self, word: &str) -> bool {
        self.content_blocks.iter().any(|b| contains_word(b, word))
    }

    /// Whether the declared references contain `name` literally
    pub fn references_name(&self, name: &str) -> bool {
        self.declared_references.iter().any(|r| r.name == name)
    }

    /// All content lines, in order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content_blocks.iter().flat_map(|b| b.lines())
    }

    /// The line carrying the declared status tag
    pub fn status_line(&self) -> Option<&str> {
        self.lines().find(|line| status_regex().is_match(line))
    }
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bstatus\b\**\s*[:=]\s*[^A-Za-z\n]*\b(planned|partial|partially|implemented)\b")
            .expect("status pattern is valid")
    })
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bversion\b\**\s*[:=]\s*\**\s*(v?\d+(?:\.\d+){0,2})")
            .expect("version pattern is valid")
    })
}

fn code_span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("code span pattern is valid"))
}

/// Extracts doc entities from Markdown files
pub struct MarkdownExtractor {
    /// Path patterns for requirement specifications
    requirement_patterns: GlobSet,
    /// Path patterns for interface contracts
    contract_patterns: GlobSet,
}

impl MarkdownExtractor {
    /// Create a new extractor with default path patterns
    pub fn new() -> Self {
        Self::with_config(&DocConfig::default())
    }

    /// Create an extractor using configured path patterns
    pub fn with_config(config: &DocConfig) -> Self {
        Self {
            requirement_patterns: compile_patterns(&config.requirement_patterns),
            contract_patterns: compile_patterns(&config.contract_patterns),
        }
    }

    /// Decide the artifact kind from its path
    pub fn artifact_kind(&self, path: &str) -> ArtifactKind {
        let path = path.trim_start_matches("./");
        if self.contract_patterns.is_match(path) {
            ArtifactKind::InterfaceContract
        } else if self.requirement_patterns.is_match(path) {
            ArtifactKind::RequirementSpec
        } else {
            ArtifactKind::Narrative
        }
    }

    /// Extract doc entities from decoded Markdown text
    pub fn extract_text(&self, path: &str, content: &str) -> ExtractedArtifact {
        let artifact_kind = self.artifact_kind(path);
        let doc_kind = match artifact_kind {
            ArtifactKind::InterfaceContract => DocKind::InterfaceContract,
            ArtifactKind::RequirementSpec => DocKind::RequirementSpec,
            _ => DocKind::Narrative,
        };

        let mut artifact = ExtractedArtifact::new(path, artifact_kind, content);
        let lines: Vec<&str> = content.lines().collect();
        let mut seen_ids = HashSet::new();

        for (ordinal, section) in self.parse_sections(content, path).into_iter().enumerate() {
            let start = section.body_start.min(lines.len());
            let body = &lines[start..section.end.clamp(start, lines.len())];

            // Heading-only sections still anchor names, so only blank headings are dropped
            let body_len: usize = body.iter().map(|l| l.trim().len()).sum();
            if section.heading.is_empty() && body_len == 0 {
                continue;
            }

            let mut entity = DocEntity::new(path, doc_kind, &section.heading, ordinal)
                .at_line(section.start_line);

            let mut id = format!("{}#{}", path, section.heading_path.join(" > "));
            if !seen_ids.insert(id.clone()) {
                id = format!("{}~{}", id, ordinal);
                seen_ids.insert(id.clone());
            }
            entity.id = id;

            entity.content_blocks = split_blocks(body);

            for reference in scan_references(body) {
                entity.declared_references.insert(reference);
            }

            let status = entity
                .lines()
                .find_map(|line| status_regex().captures(line))
                .and_then(|caps| DocStatus::parse(&caps[1]));
            entity.declared_status = status;

            let version = entity
                .lines()
                .find_map(|line| version_regex().captures(line))
                .map(|caps| caps[1].to_string());
            entity.version_tag = version;

            artifact.entities.push(entity.into());
        }

        artifact
    }

    /// Parse sections from Markdown content
    fn parse_sections(&self, content: &str, path: &str) -> Vec<Section> {
        let line_of = |offset: usize| content[..offset.min(content.len())].matches('\n').count();
        let total_lines = content.lines().count();

        let mut sections = Vec::new();
        let mut current_path: Vec<(u8, String)> = Vec::new();
        let mut current_section: Option<Section> = None;
        let mut first_heading_line = None;

        let mut in_heading = false;
        let mut heading_text = String::new();
        let mut heading_level = 1u8;

        for (event, range) in Parser::new(content).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    in_heading = true;
                    heading_level = level as u8;
                    heading_text.clear();
                    let heading_start = line_of(range.start);
                    // Setext headings span two lines
                    let heading_end = line_of(range.end.saturating_sub(1));

                    if first_heading_line.is_none() {
                        first_heading_line = Some(heading_start);
                    }

                    // Close current section if any
                    if let Some(mut section) = current_section.take() {
                        section.end = heading_start;
                        sections.push(section);
                    }

                    current_section = Some(Section {
                        heading_path: Vec::new(),
                        heading: String::new(),
                        start_line: heading_start + 1,
                        body_start: heading_end + 1,
                        end: total_lines,
                    });
                }
                Event::End(TagEnd::Heading(_)) => {
                    in_heading = false;

                    // Update heading path
                    while let Some((level, _)) = current_path.last() {
                        if *level >= heading_level {
                            current_path.pop();
                        } else {
                            break;
                        }
                    }
                    current_path.push((heading_level, heading_text.trim().to_string()));

                    if let Some(section) = current_section.as_mut() {
                        section.heading = heading_text.trim().to_string();
                        section.heading_path = current_path.iter().map(|(_, h)| h.clone()).collect();
                    }
                }
                Event::Text(text) | Event::Code(text) if in_heading => {
                    heading_text.push_str(&text);
                }
                _ => {}
            }
        }

        // Close final section
        if let Some(section) = current_section.take() {
            sections.push(section);
        }

        // Text before the first heading is anchored on the file itself
        let preamble_end = first_heading_line.unwrap_or(total_lines);
        let has_preamble = content
            .lines()
            .take(preamble_end)
            .any(|l| !l.trim().is_empty());

        if has_preamble {
            sections.insert(
                0,
                Section {
                    heading_path: vec![path.to_string()],
                    heading: path.to_string(),
                    start_line: 1,
                    body_start: 0,
                    end: preamble_end,
                },
            );
        }

        sections
    }
}

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for MarkdownExtractor {
    fn name(&self) -> &str {
        "markdown"
    }

    fn supports(&self, path: &str) -> bool {
        let ext = path.rsplit_once('.').map(|(_, e)| e.to_lowercase());
        matches!(ext.as_deref(), Some("md" | "mdx" | "markdown"))
    }

    fn extract(&self, source: &SourceFile) -> Result<ExtractedArtifact> {
        match std::str::from_utf8(&source.bytes) {
            Ok(text) => Ok(self.extract_text(&source.path, text)),
            Err(e) => {
                tracing::warn!("Could not decode {} as UTF-8: {}", source.path, e);
                Ok(ExtractedArtifact::undecodable(
                    &source.path,
                    self.artifact_kind(&source.path),
                ))
            }
        }
    }
}

/// Internal representation of a section during parsing
struct Section {
    heading_path: Vec<String>,
    heading: String,
    /// 1-indexed heading line
    start_line: usize,
    /// 0-indexed first body line
    body_start: usize,
    /// 0-indexed exclusive end line
    end: usize,
}

/// Group lines into blank-line separated blocks
fn split_blocks(lines: &[&str]) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in lines {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    blocks
}

/// Collect references from code spans outside fenced blocks
fn scan_references(lines: &[&str]) -> Vec<DocReference> {
    let mut in_fence = false;
    let mut references = Vec::new();

    for line in lines {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        references.extend(
            code_span_regex()
                .captures_iter(line)
                .filter_map(|caps| DocReference::classify(&caps[1])),
        );
    }

    references
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_markdown_sections() {
        let extractor = MarkdownExtractor::new();
        let content = r#"# Main Title

This is the introduction.

## Installation

How to install the software.

### Prerequisites

What you need before installing.

## Usage

How to use the software.
"#;

        let artifact = extractor.extract_text("README.md", content);
        assert_eq!(artifact.kind, ArtifactKind::Narrative);

        let headings: Vec<&str> = artifact
            .doc_entities()
            .map(|d| d.anchor.section.as_str())
            .collect();
        assert_eq!(headings, vec!["Main Title", "Installation", "Prerequisites", "Usage"]);

        let usage = artifact.doc_entities().find(|d| d.anchor.section == "Usage").unwrap();
        assert_eq!(usage.anchor.line, Some(13));
        assert_eq!(usage.content_blocks, vec!["How to use the software."]);
        assert_eq!(usage.anchor.ordinal, 3);
    }

    #[test]
    fn test_heading_path_ids() {
        let extractor = MarkdownExtractor::new();
        let content = "# Root\n\n## Child\n\n### Grandchild\n\nContent here.\n";

        let artifact = extractor.extract_text("test.md", content);
        let grandchild = artifact
            .doc_entities()
            .find(|d| d.anchor.section == "Grandchild")
            .unwrap();
        assert_eq!(grandchild.id, "test.md#Root > Child > Grandchild");
    }

    #[test]
    fn test_duplicate_headings_get_distinct_ids() {
        let extractor = MarkdownExtractor::new();
        let content = "## Usage\n\nfirst\n\n## Usage\n\nsecond\n";

        let artifact = extractor.extract_text("README.md", content);
        let ids: Vec<&str> = artifact.doc_entities().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_references_status_and_version() {
        let extractor = MarkdownExtractor::new();
        let content = r#"# REQ-001 Factorial

**Status:** Implemented
Version: 1.2

Implemented by `factorial()` in `calculator.py`, served at `/batch`.
Set `True` to enable.

```python
x = `not_a_ref.py`
```
"#;

        let artifact = extractor.extract_text("docs/REQUIREMENTS.md", content);
        assert_eq!(artifact.kind, ArtifactKind::RequirementSpec);

        let doc = artifact.doc_entities().next().unwrap();
        assert_eq!(doc.kind, DocKind::RequirementSpec);
        assert_eq!(doc.declared_status, Some(DocStatus::Implemented));
        assert_eq!(doc.version_tag.as_deref(), Some("1.2"));
        assert_eq!(doc.status_line(), Some("**Status:** Implemented"));

        let names: Vec<&str> = doc.declared_references.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"factorial"));
        assert!(names.contains(&"calculator.py"));
        assert!(names.contains(&"/batch"));
        assert!(!names.contains(&"True"));
        assert!(!names.contains(&"not_a_ref.py"));
    }

    #[test]
    fn test_classify_reference() {
        assert_eq!(
            DocReference::classify("legacy_utils.py"),
            Some(DocReference::module("legacy_utils.py"))
        );
        assert_eq!(DocReference::classify("src/legacy/"), Some(DocReference::module("src/legacy/")));
        assert_eq!(DocReference::classify("add()"), Some(DocReference::symbol("add")));
        assert_eq!(DocReference::classify("/power"), Some(DocReference::symbol("/power")));
        assert_eq!(DocReference::classify("self.value"), None);
        assert_eq!(DocReference::classify("pip install x"), None);
    }

    #[test]
    fn test_preamble_is_kept() {
        let extractor = MarkdownExtractor::new();
        let content = "See `setup.py` first.\n\n# Guide\n\nText.\n";

        let artifact = extractor.extract_text("README.md", content);
        let preamble = artifact.doc_entities().next().unwrap();
        assert_eq!(preamble.anchor.section, "README.md");
        assert!(preamble.references_name("setup.py"));
    }

    #[test]
    fn test_undecodable_input() {
        let extractor = MarkdownExtractor::new();
        let source = SourceFile::new("docs/guide.md", vec![0xffu8, 0xfe, 0x00, 0x80]);

        let artifact = extractor.extract(&source).unwrap();
        assert!(!artifact.decode_succeeded);
        assert!(artifact.entities.is_empty());
    }

    #[test]
    fn test_contract_kind_from_path() {
        let extractor = MarkdownExtractor::new();
        assert_eq!(extractor.artifact_kind("docs/openapi.md"), ArtifactKind::InterfaceContract);
        assert_eq!(extractor.artifact_kind("docs/guide.md"), ArtifactKind::Narrative);
        assert!(extractor.supports("docs/guide.MD"));
        assert!(!extractor.supports("src/lib.rs"));
    }
}
