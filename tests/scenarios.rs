//! End-to-end audit scenarios

use chrono::{TimeZone, Utc};
use docfresh::extract::{
    ArtifactKind, CodeEntity, CodeKind, DocEntity, DocKind, DocReference, DocStatus, Param, SourceFile,
};
use docfresh::{apply_patches, AuditReport, Auditor, Category, ExtractedArtifact, MarkdownExtractor, Severity};
use pretty_assertions::assert_eq;

const CALCULATOR: &str = r#"def factorial(n):
    """Compute the factorial of a number.
    """
    raise NotImplementedError("not yet implemented")

# Requirement: factorial
# Status: Implemented
"#;

const README: &str = "# Project

Helpers live in the modules below.

## Modules

- `app.py`: entry point
- `legacy_utils.py`: old helpers
";

const OPENAPI: &str = "# API

## GET /health

Returns service liveness.

- 200: service is up
";

fn markdown(path: &str, content: &str) -> ExtractedArtifact {
    MarkdownExtractor::new().extract_text(path, content)
}

fn calculator() -> ExtractedArtifact {
    ExtractedArtifact::new("calculator.py", ArtifactKind::Source, CALCULATOR)
        .with_entity(
            CodeEntity::new("calculator.py", "factorial", CodeKind::Function, 1)
                .with_param(Param::new("n").typed("int"))
                .with_doc("Compute the factorial of a number.")
                .with_body("raise NotImplementedError(\"not yet implemented\")"),
        )
        .with_entity(
            DocEntity::new("calculator.py", DocKind::RequirementSpec, "factorial", 0)
                .at_line(6)
                .with_block("Requirement: factorial\nStatus: Implemented")
                .with_reference(DocReference::symbol("factorial"))
                .with_status(DocStatus::Implemented),
        )
}

fn app() -> ExtractedArtifact {
    ExtractedArtifact::new("app.py", ArtifactKind::Source, "")
        .with_entity(CodeEntity::new("app.py", "/health", CodeKind::Route, 3))
        .with_entity(CodeEntity::new("app.py", "/batch", CodeKind::Route, 8))
        .with_entity(CodeEntity::new("app.py", "/power", CodeKind::Route, 13))
}

fn run(artifacts: Vec<ExtractedArtifact>) -> AuditReport {
    Auditor::default().run(artifacts).unwrap()
}

fn assert_bounds(report: &AuditReport) {
    for entry in &report.scorecard {
        assert!(entry.score <= 100);
        assert!((0.0..=1.0).contains(&entry.confidence));
    }
    for issue in &report.issues {
        assert!((0.0..=1.0).contains(&issue.confidence));
    }
}

#[test]
fn scenario_a_missing_param_and_status_mismatch() {
    let report = run(vec![calculator()]);
    assert_bounds(&report);

    let score = report.score_for("calculator.py").unwrap();
    assert_eq!(score.score, 73);
    assert_eq!(score.severity, Some(Severity::Major));

    let categories: Vec<(Category, Severity)> = report.issues.iter().map(|i| (i.category, i.severity)).collect();
    assert_eq!(
        categories,
        vec![
            (Category::StatusMismatch, Severity::Major),
            (Category::MissingParamDoc, Severity::Minor),
        ]
    );

    // Both fixes are exact-text edits of the stored content
    assert_eq!(report.auto_patch_count(), 2);
    let (patched, applied) = apply_patches(CALCULATOR, &report.patches);
    assert_eq!(applied, 2);
    assert!(patched.contains("    :param n: (int) Description pending."));
    assert!(patched.contains("# Status: Partial"));

    let (again, reapplied) = apply_patches(&patched, &report.patches);
    assert_eq!(reapplied, 0);
    assert_eq!(again, patched);
}

#[test]
fn scenario_b_stale_module_reference_round_trip() {
    let report = run(vec![markdown("README.md", README), app()]);
    assert_bounds(&report);

    assert_eq!(report.score_for("README.md").unwrap().score, 80);
    let stale: Vec<_> = report.issues_in(Category::StaleReference).collect();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].severity, Severity::Major);

    let patch = report.patches.iter().find(|p| p.issue_id == stale[0].id).unwrap();
    assert!(patch.is_auto());

    let (patched, applied) = apply_patches(README, std::slice::from_ref(patch));
    assert_eq!(applied, 1);
    assert!(!patched.contains("legacy_utils"));
    assert!(patched.contains("- `app.py`: entry point"));

    let rerun = run(vec![markdown("README.md", &patched), app()]);
    assert_eq!(rerun.score_for("README.md").unwrap().score, 100);
    assert_eq!(rerun.issues_in(Category::StaleReference).count(), 0);
}

#[test]
fn scenario_c_contract_drift() {
    let report = run(vec![app(), markdown("docs/openapi.md", OPENAPI)]);
    assert_bounds(&report);

    let drift: Vec<_> = report.issues_in(Category::ContractDrift).collect();
    assert_eq!(drift.len(), 2);
    assert!(drift.iter().all(|i| i.target_artifact == "docs/openapi.md"));
    assert!(drift.iter().all(|i| i.severity == Severity::Major));

    assert_eq!(report.score_for("docs/openapi.md").unwrap().score, 60);
    assert_eq!(report.score_for("app.py").unwrap().score, 100);

    // Contract drift is never patched automatically
    assert!(report
        .patches
        .iter()
        .filter(|p| drift.iter().any(|i| i.id == p.issue_id))
        .all(|p| !p.is_auto()));
}

#[test]
fn scenario_d_encoding_failure() {
    let sources = vec![
        SourceFile::new("docs/guide.md", vec![0xc3u8, 0x28, 0xa0, 0xa1]),
        SourceFile::new("README.md", README),
    ];
    let artifacts = Auditor::extract_all(&MarkdownExtractor::new(), &sources).unwrap();
    let report = run(artifacts);
    assert_bounds(&report);

    let failures: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.target_artifact == "docs/guide.md")
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].category, Category::EncodingFailure);
    assert_eq!(failures[0].severity, Severity::Critical);

    let score = report.score_for("docs/guide.md").unwrap();
    assert!(score.score <= 10);
    assert!(score.confidence <= 0.2);

    // The failure is not patched; it surfaces as a recommendation
    assert!(report.patches.iter().all(|p| p.issue_id != failures[0].id));
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.category == Some(Category::EncodingFailure)));
}

#[test]
fn markdown_missing_param_round_trip() {
    let readme = "# Calculator

## power()

Raises `base` to a power.
";
    let calc = || {
        ExtractedArtifact::new("calc.py", ArtifactKind::Source, "").with_entity(
            CodeEntity::new("calc.py", "power", CodeKind::Function, 1)
                .with_param(Param::new("base"))
                .with_param(Param::new("exponent"))
                .with_return_type("float"),
        )
    };

    let report = run(vec![markdown("README.md", readme), calc()]);
    assert_bounds(&report);

    let missing: Vec<_> = report.issues_in(Category::MissingParamDoc).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].target_artifact, "README.md");
    assert_eq!(missing[0].severity, Severity::Minor);
    assert_eq!(report.score_for("README.md").unwrap().score, 93);

    let (patched, applied) = apply_patches(readme, &report.patches);
    assert_eq!(applied, 1);
    assert!(patched.contains("Raises `base` to a power.\n- `exponent`: Description pending."));

    let rerun = run(vec![markdown("README.md", &patched), calc()]);
    assert_eq!(rerun.issues_in(Category::MissingParamDoc).count(), 0);
    assert_eq!(rerun.score_for("README.md").unwrap().score, 100);
}

#[test]
fn markdown_status_mismatch_round_trip() {
    let requirements = "# Requirements

## CSV export

Status: Implemented

Results can be exported through `export_csv()`.
";

    let report = run(vec![markdown("docs/REQUIREMENTS.md", requirements), app()]);
    assert_bounds(&report);

    let mismatches: Vec<_> = report.issues_in(Category::StatusMismatch).collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].target_artifact, "docs/REQUIREMENTS.md");

    let patch = report.patches.iter().find(|p| p.issue_id == mismatches[0].id).unwrap();
    assert!(patch.is_auto());

    let (patched, applied) = apply_patches(requirements, std::slice::from_ref(patch));
    assert_eq!(applied, 1);
    assert!(patched.contains("Status: Planned"));

    let rerun = run(vec![markdown("docs/REQUIREMENTS.md", &patched), app()]);
    assert_eq!(rerun.issues_in(Category::StatusMismatch).count(), 0);
    // The missing function is still named, so the dangling reference remains
    assert_eq!(rerun.issues_in(Category::StaleReference).count(), 1);
}

#[test]
fn identical_input_gives_identical_reports() {
    let timestamp = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let artifacts = || {
        vec![
            calculator(),
            app(),
            markdown("README.md", README),
            markdown("docs/openapi.md", OPENAPI),
        ]
    };

    let first = Auditor::default().run_at(artifacts(), timestamp).unwrap();
    let second = Auditor::default().run_at(artifacts(), timestamp).unwrap();

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn traceability_needs_requirement_ids() {
    let requirements = "# Requirements

## REQ-001 Health check

The service exposes `/health`.
";

    let report = run(vec![app(), markdown("docs/requirements.md", requirements)]);
    let mut gaps: Vec<&str> = report
        .issues_in(Category::TraceabilityGap)
        .filter_map(|i| i.entity.as_deref())
        .collect();
    gaps.sort_unstable();

    assert_eq!(gaps, vec!["app.py::/batch", "app.py::/power"]);

    // Gaps need a new requirement, which no patch can write
    let gap_ids: Vec<&str> = report
        .issues_in(Category::TraceabilityGap)
        .map(|i| i.id.as_str())
        .collect();
    assert!(report.patches.iter().all(|p| !gap_ids.contains(&p.issue_id.as_str())));
}

#[test]
fn inventory_json_round_trips_through_serde() {
    let json = serde_json::to_string(&vec![calculator(), app()]).unwrap();
    let artifacts: Vec<ExtractedArtifact> = serde_json::from_str(&json).unwrap();

    let report = run(artifacts);
    assert_eq!(report.score_for("calculator.py").unwrap().score, 73);
    assert_eq!(report.undocumented.len(), 3);
}
