//! Patch suggestions
//!
//! Exact-text edits that fix an issue, plus helpers to apply and preview them.

mod synthesizer;

pub use synthesizer::PatchSynthesizer;

use serde::{Deserialize, Serialize};
use similar::TextDiff;

/// Whether a patch can be applied mechanically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    /// The before span occurs exactly once and can be swapped verbatim
    Auto,
    /// A human has to make the change
    Manual,
}

impl std::fmt::Display for Applicability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Applicability::Auto => write!(f, "auto"),
            Applicability::Manual => write!(f, "manual"),
        }
    }
}

/// A suggested edit for one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSuggestion {
    pub issue_id: String,
    pub target_artifact: String,
    /// Exact text to replace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_span: Option<String>,
    /// Replacement text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_span: Option<String>,
    pub applicability: Applicability,
    /// Human-readable summary of the edit
    pub note: String,
}

impl PatchSuggestion {
    /// Create an automatically applicable patch
    pub fn auto(issue_id: &str, target: &str, before: &str, after: &str, note: &str) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            target_artifact: target.to_string(),
            before_span: Some(before.to_string()),
            after_span: Some(after.to_string()),
            applicability: Applicability::Auto,
            note: note.to_string(),
        }
    }

    /// Create a patch that needs a human
    pub fn manual(issue_id: &str, target: &str, note: &str) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            target_artifact: target.to_string(),
            before_span: None,
            after_span: None,
            applicability: Applicability::Manual,
            note: note.to_string(),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.applicability == Applicability::Auto
    }

    /// Apply to `content`; None unless the before span occurs exactly once
    pub fn apply(&self, content: &str) -> Option<String> {
        if !self.is_auto() {
            return None;
        }

        let before = self.before_span.as_deref()?;
        let after = self.after_span.as_deref()?;
        if before.is_empty() || content.matches(before).count() != 1 {
            return None;
        }

        // Appends keep their before span, so a second pass would repeat them
        if after.contains(before) && content.contains(after) {
            return None;
        }

        Some(content.replacen(before, after, 1))
    }

    /// Unified diff of the change this patch makes to `content`
    pub fn preview(&self, content: &str) -> Option<String> {
        let patched = self.apply(content)?;
        let diff = TextDiff::from_lines(content, &patched);
        Some(
            diff.unified_diff()
                .context_radius(2)
                .header(&self.target_artifact, &self.target_artifact)
                .to_string(),
        )
    }
}

/// Apply every auto patch that still applies, in order
///
/// Returns the new content and the number of patches applied.
pub fn apply_patches(content: &str, patches: &[PatchSuggestion]) -> (String, usize) {
    let mut current = content.to_string();
    let mut applied = 0;

    for patch in patches {
        match patch.apply(&current) {
            Some(next) => {
                current = next;
                applied += 1;
            }
            None if patch.is_auto() => {
                tracing::debug!("Patch {} no longer applies, skipping", patch.issue_id);
            }
            None => {}
        }
    }

    (current, applied)
}
