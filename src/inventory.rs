//! Immutable entity inventory for one audit run
//!
//! Built once from the complete extractor output; every later stage reads it
//! for existence checks and never mutates it.

use crate::config::RuleConfig;
use crate::error::AuditError;
use crate::extract::{
    normalize_route, ArtifactKind, CodeEntity, CodeKind, DocEntity, DocKind, DocReference, Entity,
    EntityFacts, ExtractedArtifact, ReferenceScope,
};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Stored facts about one artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    pub path: String,
    pub kind: ArtifactKind,
    pub content: String,
    pub decode_succeeded: bool,
}

/// Global, read-only view over every entity in the run
#[derive(Debug)]
pub struct Inventory {
    artifacts: BTreeMap<String, ArtifactRecord>,
    code: Vec<CodeEntity>,
    docs: Vec<DocEntity>,
    code_index: HashMap<String, usize>,
    doc_index: HashMap<String, usize>,
    symbol_names: HashSet<String>,
    route_paths: HashSet<String>,
    module_names: HashSet<String>,
    doc_anchors: HashSet<String>,
    requirement_ids: BTreeMap<String, Vec<String>>,
}

impl Inventory {
    /// Build the inventory from the complete extractor output
    pub fn build(extracted: Vec<ExtractedArtifact>, rules: &RuleConfig) -> Result<Self, AuditError> {
        if extracted.is_empty() {
            return Err(AuditError::NoArtifacts);
        }

        let requirement_pattern = Regex::new(&rules.requirement_id_pattern)?;

        let mut artifacts = BTreeMap::new();
        let mut code = Vec::new();
        let mut docs = Vec::new();

        for artifact in extracted {
            let ExtractedArtifact {
                path,
                kind,
                content,
                entities,
                decode_succeeded,
            } = artifact;

            if artifacts.contains_key(&path) {
                return Err(AuditError::DuplicateArtifact(path));
            }

            for entity in entities {
                if entity.artifact_path() != path {
                    return Err(AuditError::MisplacedEntity {
                        id: entity.id().to_string(),
                        claimed: entity.artifact_path().to_string(),
                        actual: path.clone(),
                    });
                }

                // Nothing structural survives a failed decode
                if !decode_succeeded {
                    continue;
                }

                match entity {
                    Entity::Code(c) => code.push(c),
                    Entity::Doc(d) => docs.push(d),
                }
            }

            artifacts.insert(
                path.clone(),
                ArtifactRecord {
                    path,
                    kind,
                    content,
                    decode_succeeded,
                },
            );
        }

        code.sort_by(|a, b| a.id.cmp(&b.id));
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        check_unique(&code)?;
        check_unique(&docs)?;

        let code_index = code.iter().enumerate().map(|(i, c)| (c.id.clone(), i)).collect();
        let doc_index = docs.iter().enumerate().map(|(i, d)| (d.id.clone(), i)).collect();

        let mut symbol_names = HashSet::new();
        let mut route_paths = HashSet::new();
        let mut module_names = HashSet::new();
        for entity in &code {
            symbol_names.insert(entity.qualified_name.clone());
            symbol_names.insert(entity.short_name().to_string());
            if let Some(route) = entity.route_path() {
                route_paths.insert(route);
            }
            if entity.kind == CodeKind::Module {
                module_names.insert(entity.qualified_name.clone());
                module_names.insert(entity.short_name().to_string());
            }
        }

        let doc_anchors = docs.iter().map(|d| d.anchor.section.to_lowercase()).collect();

        let requirement_ids = docs
            .iter()
            .filter(|d| d.kind == DocKind::RequirementSpec)
            .filter_map(|d| {
                let mut haystacks = vec![d.anchor.section.as_str()];
                haystacks.extend(d.content_blocks.iter().map(String::as_str));

                let ids: BTreeSet<String> = haystacks
                    .into_iter()
                    .flat_map(|h| requirement_pattern.find_iter(h))
                    .map(|m| m.as_str().to_string())
                    .collect();

                (!ids.is_empty()).then(|| (d.id.clone(), ids.into_iter().collect()))
            })
            .collect();

        Ok(Self {
            artifacts,
            code,
            docs,
            code_index,
            doc_index,
            symbol_names,
            route_paths,
            module_names,
            doc_anchors,
            requirement_ids,
        })
    }

    /// All artifacts, ordered by path
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.artifacts.values()
    }

    pub fn artifact(&self, path: &str) -> Option<&ArtifactRecord> {
        self.artifacts.get(path)
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// All code entities, ordered by id
    pub fn code_entities(&self) -> &[CodeEntity] {
        &self.code
    }

    /// All doc entities, ordered by id
    pub fn doc_entities(&self) -> &[DocEntity] {
        &self.docs
    }

    pub fn code(&self, id: &str) -> Option<&CodeEntity> {
        self.code_index.get(id).map(|i| &self.code[*i])
    }

    pub fn doc(&self, id: &str) -> Option<&DocEntity> {
        self.doc_index.get(id).map(|i| &self.docs[*i])
    }

    pub fn code_in<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a CodeEntity> + 'a {
        self.code.iter().filter(move |c| c.location.path == path)
    }

    pub fn docs_in<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a DocEntity> + 'a {
        self.docs.iter().filter(move |d| d.anchor.path == path)
    }

    /// Whether some code route normalizes to this path
    pub fn has_route(&self, path: &str) -> bool {
        self.route_paths.contains(&normalize_route(path))
    }

    /// Decodable interface contract artifacts, ordered by path
    pub fn contract_artifacts(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.artifacts
            .values()
            .filter(|a| a.kind == ArtifactKind::InterfaceContract && a.decode_succeeded)
    }

    /// Whether a declared reference names something that exists
    pub fn resolves(&self, reference: &DocReference) -> bool {
        let name = reference.name.trim();
        match reference.scope {
            ReferenceScope::Module => self.module_exists(name) || self.symbol_exists(name),
            ReferenceScope::Symbol => self.symbol_exists(name) || self.doc_exists(name),
        }
    }

    /// Code entities a reference points at
    pub fn code_named<'a>(&'a self, reference: &'a DocReference) -> impl Iterator<Item = &'a CodeEntity> + 'a {
        self.code.iter().filter(move |c| names_code(reference, c))
    }

    /// Requirement IDs carried by a requirement spec entity
    pub fn requirement_ids(&self, doc_id: &str) -> &[String] {
        self.requirement_ids.get(doc_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any requirement spec follows the requirement-ID convention
    pub fn has_requirement_convention(&self) -> bool {
        !self.requirement_ids.is_empty()
    }

    /// Whether an ID-bearing requirement explicitly references this entity
    pub fn is_traced(&self, code: &CodeEntity) -> bool {
        self.requirement_ids.keys().filter_map(|id| self.doc(id)).any(|doc| {
            doc.declared_references
                .iter()
                .any(|r| names_code_exactly(r, code))
        })
    }

    fn symbol_exists(&self, name: &str) -> bool {
        if name.starts_with('/') {
            return self.route_paths.contains(&normalize_route(name));
        }
        self.symbol_names.contains(name)
    }

    fn module_exists(&self, name: &str) -> bool {
        let name = name.trim_start_matches("./").trim_end_matches('/');
        if name.is_empty() {
            return false;
        }

        if self.module_names.contains(name) {
            return true;
        }

        if let Some((stem, _)) = name.rsplit_once('.') {
            if self.module_names.contains(&stem.replace('/', ".")) {
                return true;
            }
        }

        let as_file = format!("/{}", name);
        let as_dir = format!("{}/", name);
        let nested_dir = format!("/{}/", name);
        self.artifacts.keys().any(|path| {
            path == name || path.ends_with(&as_file) || path.starts_with(&as_dir) || path.contains(&nested_dir)
        })
    }

    fn doc_exists(&self, name: &str) -> bool {
        self.doc_anchors.contains(&name.to_lowercase()) || self.doc_index.contains_key(name)
    }
}

/// Whether a reference names the entity by qualified name or route path
pub(crate) fn names_code_exactly(reference: &DocReference, code: &CodeEntity) -> bool {
    if reference.name == code.qualified_name {
        return true;
    }
    match code.route_path() {
        Some(route) => reference.name.starts_with('/') && normalize_route(&reference.name) == route,
        None => false,
    }
}

/// Like `names_code_exactly`, also accepting the short name
fn names_code(reference: &DocReference, code: &CodeEntity) -> bool {
    names_code_exactly(reference, code) || reference.name == code.short_name()
}

fn check_unique<T: EntityFacts>(entities: &[T]) -> Result<(), AuditError> {
    for pair in entities.windows(2) {
        if pair[0].id() == pair[1].id() {
            return Err(AuditError::DuplicateEntity {
                id: pair[0].id().to_string(),
                first: pair[0].artifact_path().to_string(),
                second: pair[1].artifact_path().to_string(),
            });
        }
    }
    Ok(())
}
