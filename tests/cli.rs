//! Integration tests for the docfresh binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const README: &str = "# Layout

- `legacy_utils.py`: old helpers
";

fn docfresh_cmd() -> Command {
    Command::cargo_bin("docfresh").expect("Failed to find docfresh binary")
}

fn repo_with_readme() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("README.md"), README).unwrap();
    dir
}

#[test]
fn test_audit_reports_stale_reference() {
    let dir = repo_with_readme();

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "audit", "--docs", "README.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Documentation Freshness Report"))
        .stdout(predicate::str::contains("Health: needs_attention"))
        .stdout(predicate::str::contains("stale_reference"))
        .stdout(predicate::str::contains("legacy_utils.py"));
}

#[test]
fn test_audit_json_output() {
    let dir = repo_with_readme();

    let output = docfresh_cmd()
        .args(["-p", dir.path().to_str().unwrap(), "-o", "json", "audit", "-d", "README.md"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["scorecard"][0]["path"], "README.md");
    assert_eq!(report["scorecard"][0]["score"], 80);
    assert_eq!(report["issues"][0]["category"], "stale_reference");
    assert_eq!(report["issues"][0]["severity"], "major");
    assert_eq!(report["patches"][0]["applicability"], "auto");
    assert_eq!(report["summary"]["totalFiles"], 1);
    assert_eq!(report["summary"]["majorIssues"], 1);
}

#[test]
fn test_audit_inventory_file() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = r#"[
        {
            "path": "calc.py",
            "kind": "source",
            "content": "def add(a, b):\n    \"\"\"Add a to b.\"\"\"\n    return a + b\n",
            "entities": [
                {
                    "entity": "code",
                    "id": "calc.py::add",
                    "kind": "function",
                    "qualified_name": "add",
                    "signature": [{"name": "a"}, {"name": "b"}],
                    "attached_doc": "Add a to b.",
                    "location": {"path": "calc.py", "line": 1}
                }
            ]
        }
    ]"#;
    fs::write(dir.path().join("inventory.json"), inventory).unwrap();

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "audit", "inventory.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No documentation drift detected"));
}

#[test]
fn test_fail_under_threshold() {
    let dir = repo_with_readme();

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "audit", "--docs", "README.md", "--fail-under", "90"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("below 90"));

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "audit", "--docs", "README.md", "--fail-under", "80"])
        .assert()
        .success();
}

#[test]
fn test_explicit_config_changes_weights() {
    let dir = repo_with_readme();
    let config = dir.path().join("strict.toml");
    fs::write(&config, "[scoring]\nmajor = 35\n").unwrap();

    let output = docfresh_cmd()
        .args([
            "--path",
            dir.path().to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "-o",
            "json",
            "audit",
            "--docs",
            "README.md",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["scorecard"][0]["score"], 65);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = repo_with_readme();
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[matching]\nlink_threshold = 2.5\n").unwrap();

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "--config", config.to_str().unwrap()])
        .args(["audit", "--docs", "README.md"])
        .assert()
        .failure();
}

#[test]
fn test_missing_doc_file() {
    let dir = tempfile::tempdir().unwrap();

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "audit", "--docs", "MISSING.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MISSING.md"));
}

#[test]
fn test_config_show_and_reset() {
    let dir = tempfile::tempdir().unwrap();

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("link_threshold"))
        .stdout(predicate::str::contains("encoding_cap"));

    docfresh_cmd()
        .args(["--path", dir.path().to_str().unwrap(), "config", "--reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration reset"));

    assert!(dir.path().join(".docfresh").join("config.toml").exists());
}
