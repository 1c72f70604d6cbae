//! Command implementations

use crate::audit::Auditor;
use crate::config::{AuditConfig, CONFIG_DIR};
use crate::drift::Severity;
use crate::extract::{ExtractedArtifact, Extractor, MarkdownExtractor, SourceFile};
use crate::patch::Applicability;
use crate::report::AuditReport;
use anyhow::{Context, Result};
use std::path::Path;

/// Load the explicit config file, or the repository config, or defaults
pub fn load_config(repo_path: &Path, explicit: Option<&str>) -> Result<AuditConfig> {
    match explicit {
        Some(file) => AuditConfig::load(Path::new(file)),
        None => AuditConfig::load_or_default(repo_path),
    }
}

/// Read extracted artifacts from a JSON inventory file
pub fn load_artifacts(file: &Path) -> Result<Vec<ExtractedArtifact>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read inventory file: {:?}", file))?;
    let artifacts: Vec<ExtractedArtifact> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse inventory file: {:?}", file))?;
    Ok(artifacts)
}

/// Extract Markdown files relative to the repository root
pub fn extract_docs(repo_path: &Path, docs: &[String], config: &AuditConfig) -> Result<Vec<ExtractedArtifact>> {
    let extractor = MarkdownExtractor::with_config(&config.docs);

    let mut sources = Vec::with_capacity(docs.len());
    for doc in docs {
        if !extractor.supports(doc) {
            tracing::warn!("{} does not look like Markdown, extracting anyway", doc);
        }

        let bytes = std::fs::read(repo_path.join(doc))
            .with_context(|| format!("Failed to read documentation file: {}", doc))?;
        sources.push(SourceFile::new(&doc.replace('\\', "/"), bytes));
    }

    Ok(Auditor::extract_all(&extractor, &sources)?)
}

/// Run an audit over an inventory file and/or Markdown files
pub fn audit(
    repo_path: &Path,
    config: AuditConfig,
    inventory: Option<&str>,
    docs: &[String],
) -> Result<AuditReport> {
    let mut artifacts = match inventory {
        Some(file) => load_artifacts(&repo_path.join(file))?,
        None => Vec::new(),
    };
    artifacts.extend(extract_docs(repo_path, docs, &config)?);

    let auditor = Auditor::new(config);
    let report = auditor.run(artifacts).context("Audit failed")?;
    Ok(report)
}

/// Show configuration
pub fn show_config(config: &AuditConfig) -> Result<()> {
    println!("docfresh Configuration");
    println!("======================\n");

    let content = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", content);
    Ok(())
}

/// Reset repository configuration to defaults
pub fn reset_config(repo_path: &Path) -> Result<()> {
    AuditConfig::default().save(repo_path)?;
    println!(
        "✓ Configuration reset to defaults in {:?}",
        repo_path.join(CONFIG_DIR).join("config.toml")
    );
    Ok(())
}

/// Print report in JSON format
pub fn print_report_json(report: &AuditReport) -> Result<()> {
    let json = report.to_json()?;
    println!("{}", json);
    Ok(())
}

/// Print report in text format
pub fn print_report_text(report: &AuditReport) {
    println!("Documentation Freshness Report");
    println!("==============================\n");
    println!("Generated: {}", report.generated_at.to_rfc3339());
    let summary = &report.summary;
    println!(
        "Health: {} ({} file(s), average {:.2})",
        summary.overall_health.as_str(),
        summary.total_files,
        summary.average_freshness_score
    );
    println!(
        "Issues: {} critical, {} major, {} minor\n",
        summary.critical_issues, summary.major_issues, summary.minor_issues
    );

    println!("Scorecard:");
    for entry in &report.scorecard {
        let severity = entry
            .severity
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>3}  {:<8} {:>4.0}%  {}",
            entry.score,
            severity,
            entry.confidence * 100.0,
            entry.artifact_path
        );
    }

    if report.issues.is_empty() {
        println!("\n✓ No documentation drift detected!");
        return;
    }

    println!("\nIssues:");
    println!("-------\n");

    for issue in &report.issues {
        let severity_icon = match issue.severity {
            Severity::Critical => "🔴",
            Severity::Major => "🟠",
            Severity::Minor => "🟡",
        };

        println!(
            "{} [{}] {} in {}",
            severity_icon, issue.severity, issue.category, issue.target_artifact
        );
        println!("   ID: {}", issue.id);
        println!("   Expected: {}", issue.expected);
        println!("   Actual: {}", issue.actual);
        println!("   Confidence: {:.0}%", issue.confidence * 100.0);
        println!();
    }

    if !report.patches.is_empty() {
        println!("Patches ({} auto):", report.auto_patch_count());
        for patch in &report.patches {
            let marker = match patch.applicability {
                Applicability::Auto => "auto  ",
                Applicability::Manual => "manual",
            };
            println!("  {} {} {}: {}", marker, patch.issue_id, patch.target_artifact, patch.note);
        }
        println!();
    }

    if !report.recommendations.is_empty() {
        println!("Recommendations:");
        for recommendation in &report.recommendations {
            println!("  - {}", recommendation.message);
            if !recommendation.artifacts.is_empty() {
                println!("    ({})", recommendation.artifacts.join(", "));
            }
        }
    }
}
