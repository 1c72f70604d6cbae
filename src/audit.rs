//! Audit pipeline
//!
//! Extractor → Inventory → Matcher → Analyzer → Synthesizer → Assembler.
//! The inventory build and the report assembly are the only barriers.

use crate::config::AuditConfig;
use crate::drift::DriftAnalyzer;
use crate::error::AuditError;
use crate::extract::{ExtractedArtifact, Extractor, SourceFile};
use crate::inventory::Inventory;
use crate::matcher::EntityMatcher;
use crate::patch::PatchSynthesizer;
use crate::report::{AuditReport, ReportAssembler, UndocumentedEntity};
use chrono::{DateTime, Utc};
use rayon::prelude::*;

/// Runs complete audits over extracted artifacts
pub struct Auditor {
    config: AuditConfig,
    matcher: EntityMatcher,
    analyzer: DriftAnalyzer,
    synthesizer: PatchSynthesizer,
    assembler: ReportAssembler,
}

impl Auditor {
    /// Create an auditor from configuration
    pub fn new(config: AuditConfig) -> Self {
        Self {
            matcher: EntityMatcher::new(config.matching.clone()),
            analyzer: DriftAnalyzer::new(&config),
            synthesizer: PatchSynthesizer::new(),
            assembler: ReportAssembler::new(),
            config,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run an extractor over raw sources in parallel
    ///
    /// Undecodable input comes back as data; only a failing extractor aborts.
    pub fn extract_all(
        extractor: &dyn Extractor,
        sources: &[SourceFile],
    ) -> Result<Vec<ExtractedArtifact>, AuditError> {
        sources
            .par_iter()
            .map(|source| {
                extractor.extract(source).map_err(|e| AuditError::Extractor {
                    extractor: extractor.name().to_string(),
                    path: source.path.clone(),
                    message: format!("{:#}", e),
                })
            })
            .collect()
    }

    /// Audit a complete artifact set
    pub fn run(&self, artifacts: Vec<ExtractedArtifact>) -> Result<AuditReport, AuditError> {
        self.run_at(artifacts, Utc::now())
    }

    /// Audit a complete artifact set with a fixed report timestamp
    pub fn run_at(
        &self,
        artifacts: Vec<ExtractedArtifact>,
        generated_at: DateTime<Utc>,
    ) -> Result<AuditReport, AuditError> {
        let inventory = Inventory::build(artifacts, &self.config.rules)?;
        tracing::info!(
            "Auditing {} artifacts ({} code entities, {} doc entities)",
            inventory.artifact_count(),
            inventory.code_entities().len(),
            inventory.doc_entities().len()
        );

        for artifact in inventory.artifacts().filter(|a| !a.decode_succeeded) {
            tracing::warn!("Artifact {} could not be decoded; it is reported but not audited", artifact.path);
        }

        let matches = self.matcher.match_all(&inventory);
        let analyses = self.analyzer.analyze(&inventory, &matches);

        let issues: Vec<_> = analyses.iter().flat_map(|a| a.issues.iter().cloned()).collect();
        let patches = self.synthesizer.synthesize_all(&issues, &inventory);

        let undocumented = matches
            .undocumented()
            .iter()
            .filter_map(|id| inventory.code(id))
            .map(|code| UndocumentedEntity {
                id: code.id.clone(),
                artifact_path: code.location.path.clone(),
                name: code.qualified_name.clone(),
                signature: code.display_signature(),
            })
            .collect();

        let report = self.assembler.assemble_at(analyses, patches, undocumented, generated_at);
        tracing::info!(
            "Audit complete: {} issues, {} patches, lowest score {}",
            report.issues.len(),
            report.patches.len(),
            report.lowest_score()
        );

        Ok(report)
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}
