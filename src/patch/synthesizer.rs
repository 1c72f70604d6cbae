//! Patch synthesis
//!
//! Converts fix hints into minimal text edits against the stored artifact
//! content. A span is only proposed when it occurs exactly once.

use super::PatchSuggestion;
use crate::drift::{Category, FixHint, Issue};
use crate::extract::DocStatus;
use crate::inventory::Inventory;
use rayon::prelude::*;
use regex::RegexBuilder;

/// Builds patch suggestions for issues
pub struct PatchSynthesizer;

impl PatchSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Suggestions for all issues, in issue order
    pub fn synthesize_all(&self, issues: &[Issue], inventory: &Inventory) -> Vec<PatchSuggestion> {
        let patches: Vec<PatchSuggestion> = issues
            .par_iter()
            .filter_map(|issue| self.synthesize(issue, inventory))
            .collect();

        let auto = patches.iter().filter(|p| p.is_auto()).count();
        tracing::debug!(
            "Synthesized {} patches ({} auto, {} manual)",
            patches.len(),
            auto,
            patches.len() - auto
        );

        patches
    }

    /// Suggestion for one issue, None for categories that only surface as recommendations
    pub fn synthesize(&self, issue: &Issue, inventory: &Inventory) -> Option<PatchSuggestion> {
        match issue.category {
            Category::TraceabilityGap | Category::EncodingFailure => return None,
            Category::ContractDrift => {
                return Some(PatchSuggestion::manual(
                    &issue.id,
                    &issue.target_artifact,
                    &format!("Update the interface contract: {}", issue.actual),
                ));
            }
            _ => {}
        }

        let manual = |reason: &str| {
            PatchSuggestion::manual(
                &issue.id,
                &issue.target_artifact,
                &format!("{}; {}", issue.expected, reason),
            )
        };

        let content = match inventory.artifact(&issue.target_artifact) {
            Some(artifact) if artifact.decode_succeeded => artifact.content.as_str(),
            _ => return Some(manual("artifact content is unavailable")),
        };

        let Some(fix) = issue.fix.as_ref() else {
            return Some(manual("no examined text to patch"));
        };

        let spans = match fix {
            FixHint::AppendParam { description, line } => append_param(content, description, line),
            FixHint::RemoveLine { line, reference } => remove_line(content, line, reference),
            FixHint::ReplaceStatus { line, from, to } => replace_status(content, line, *from, *to),
        };

        match spans {
            Some((before, after)) => {
                Some(PatchSuggestion::auto(&issue.id, &issue.target_artifact, &before, &after, &note(fix)))
            }
            None => {
                tracing::warn!(
                    "Patch for {} in {} downgraded to manual: span not unique",
                    issue.id,
                    issue.target_artifact
                );
                Some(manual("the examined text could not be located exactly once"))
            }
        }
    }
}

impl Default for PatchSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

fn note(fix: &FixHint) -> String {
    match fix {
        FixHint::AppendParam { line, .. } => format!("Add `{}`", line.trim()),
        FixHint::RemoveLine { reference, .. } => format!("Remove the line referencing `{}`", reference),
        FixHint::ReplaceStatus { from, to, .. } => format!("Change status from {} to {}", from, to),
    }
}

fn occurs_once(content: &str, span: &str) -> bool {
    !span.is_empty() && content.matches(span).count() == 1
}

/// Leading whitespace of the content line holding `span`
fn indent_of(content: &str, span: &str) -> String {
    let Some(start) = content.find(span) else {
        return String::new();
    };
    let line_start = content[..start].rfind('\n').map_or(0, |i| i + 1);
    content[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

fn append_param(content: &str, description: &str, line: &str) -> Option<(String, String)> {
    let last_line = description.lines().rev().map(str::trim).find(|l| !l.is_empty());
    let candidates = [last_line, Some(description.trim())];

    let span = candidates
        .into_iter()
        .flatten()
        .find(|span| occurs_once(content, span))?;

    // The span must end a line, so the new line lands below it
    let end = content.find(span)? + span.len();
    if !(content[end..].is_empty() || content[end..].starts_with('\n') || content[end..].starts_with("\r\n")) {
        return None;
    }

    let indent = indent_of(content, span);
    Some((span.to_string(), format!("{}\n{}{}", span, indent, line)))
}

/// List items, param directives, and lines holding nothing but the reference
fn is_removable(line: &str, reference: &str) -> bool {
    let trimmed = line.trim();

    let ordered_item = trimmed
        .split_once(". ")
        .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    let list_item = ["- ", "* ", "+ "].iter().any(|m| trimmed.starts_with(m)) || ordered_item;
    let directive = trimmed.starts_with(":param") || trimmed.starts_with("@param");

    let bare = trimmed
        .trim_matches(|c: char| c == '`' || c.is_ascii_punctuation() || c.is_whitespace())
        .replace('`', "");
    let only_reference = bare == reference.trim_matches(|c: char| c == '`' || c.is_ascii_punctuation());

    list_item || directive || only_reference
}

fn remove_line(content: &str, line: &str, reference: &str) -> Option<(String, String)> {
    if line.trim().is_empty() || !is_removable(line, reference) {
        return None;
    }

    let with_newline_before = format!("\n{}", line);
    if occurs_once(content, &with_newline_before) {
        return Some((with_newline_before, String::new()));
    }

    // First line of the artifact
    let with_newline_after = format!("{}\n", line);
    if content.starts_with(&with_newline_after) && occurs_once(content, &with_newline_after) {
        return Some((with_newline_after, String::new()));
    }

    None
}

fn replace_status(content: &str, line: &str, from: DocStatus, to: DocStatus) -> Option<(String, String)> {
    if !occurs_once(content, line) {
        return None;
    }

    let word = RegexBuilder::new(&format!(r"\b{}\b", from.as_str()))
        .case_insensitive(true)
        .build()
        .ok()?;

    let found = word.find(line)?;
    let replacement = match_case(found.as_str(), to.as_str());
    let after = word.replacen(line, 1, replacement.as_str()).into_owned();

    (after != line).then(|| (line.to_string(), after))
}

/// Render `word` in the case style of `sample`
fn match_case(sample: &str, word: &str) -> String {
    if sample.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()) {
        word.to_uppercase()
    } else if sample.chars().all(|c| !c.is_alphabetic() || c.is_lowercase()) {
        word.to_lowercase()
    } else {
        word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::drift::Severity;
    use crate::extract::{ArtifactKind, ExtractedArtifact};

    fn inventory(path: &str, content: &str) -> Inventory {
        let artifact = ExtractedArtifact::new(path, ArtifactKind::Source, content);
        Inventory::build(vec![artifact], &RuleConfig::default()).unwrap()
    }

    fn issue(category: Category, path: &str, fix: Option<FixHint>) -> Issue {
        let issue = Issue::new(category, Severity::Minor, path, "subject", 0.9);
        match fix {
            Some(fix) => issue.with_fix(fix),
            None => issue,
        }
    }

    #[test]
    fn test_append_param_after_last_line() {
        let content = "def factorial(n):\n    \"\"\"Compute the factorial.\n\n    Returns an int.\n    \"\"\"\n";
        let inv = inventory("calc.py", content);
        let fix = FixHint::AppendParam {
            description: "Compute the factorial.\n\nReturns an int.".to_string(),
            line: ":param n: Description pending.".to_string(),
        };

        let patch = PatchSynthesizer::new()
            .synthesize(&issue(Category::MissingParamDoc, "calc.py", Some(fix)), &inv)
            .unwrap();

        assert!(patch.is_auto());
        assert_eq!(patch.before_span.as_deref(), Some("Returns an int."));
        assert_eq!(
            patch.after_span.as_deref(),
            Some("Returns an int.\n    :param n: Description pending.")
        );
    }

    #[test]
    fn test_remove_line_requires_removable_line() {
        assert!(is_removable("- `legacy_utils.py`: old helpers", "legacy_utils.py"));
        assert!(is_removable("3. See `old.py`", "old.py"));
        assert!(is_removable("`legacy_utils.py`", "legacy_utils.py"));
        assert!(is_removable(":param b: removed", "b"));
        assert!(!is_removable("The helpers in `legacy_utils.py` are gone.", "legacy_utils.py"));
    }

    #[test]
    fn test_remove_first_line() {
        let content = "- `old.py`: gone\n- `app.py`: main\n";
        assert_eq!(
            remove_line(content, "- `old.py`: gone", "old.py"),
            Some(("- `old.py`: gone\n".to_string(), String::new()))
        );
    }

    #[test]
    fn test_replace_status_preserves_case() {
        let content = "## Factorial\n\n**Status:** IMPLEMENTED\n";
        let (before, after) =
            replace_status(content, "**Status:** IMPLEMENTED", DocStatus::Implemented, DocStatus::Partial).unwrap();
        assert_eq!(before, "**Status:** IMPLEMENTED");
        assert_eq!(after, "**Status:** PARTIAL");
    }

    #[test]
    fn test_duplicate_span_downgrades_to_manual() {
        let content = "Status: Implemented\n\nStatus: Implemented\n";
        let inv = inventory("REQUIREMENTS.md", content);
        let fix = FixHint::ReplaceStatus {
            line: "Status: Implemented".to_string(),
            from: DocStatus::Implemented,
            to: DocStatus::Planned,
        };

        let patch = PatchSynthesizer::new()
            .synthesize(&issue(Category::StatusMismatch, "REQUIREMENTS.md", Some(fix)), &inv)
            .unwrap();
        assert!(!patch.is_auto());
        assert!(patch.before_span.is_none());
    }

    #[test]
    fn test_categories_without_auto_patches() {
        let inv = inventory("openapi.md", "# API\n");
        let synthesizer = PatchSynthesizer::new();

        let contract = synthesizer
            .synthesize(&issue(Category::ContractDrift, "openapi.md", None), &inv)
            .unwrap();
        assert!(!contract.is_auto());

        assert!(synthesizer
            .synthesize(&issue(Category::TraceabilityGap, "openapi.md", None), &inv)
            .is_none());
        assert!(synthesizer
            .synthesize(&issue(Category::EncodingFailure, "openapi.md", None), &inv)
            .is_none());
    }
}
