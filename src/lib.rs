//! docfresh - Deterministic documentation freshness auditing
//!
//! This library cross-references code entities against their documentation,
//! reports where the two have drifted apart, scores each artifact, and
//! proposes exact-text patches for the drift it can fix mechanically.

pub mod audit;
pub mod cli;
pub mod config;
pub mod drift;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod matcher;
pub mod patch;
pub mod report;

/// Re-export commonly used types
pub use audit::Auditor;
pub use config::AuditConfig;
pub use drift::{Category, FreshnessScore, Issue, Severity};
pub use error::AuditError;
pub use extract::{CodeEntity, DocEntity, Entity, ExtractedArtifact, Extractor, MarkdownExtractor};
pub use inventory::Inventory;
pub use patch::{apply_patches, PatchSuggestion};
pub use report::{AuditReport, OverallHealth, ReportSummary};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "docfresh";
