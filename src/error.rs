//! Fatal audit errors
//!
//! Everything else degrades into issues, lower scores, or manual patches.

use thiserror::Error;

/// Errors that abort an audit run before any report is produced
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("no artifacts were supplied to the audit run")]
    NoArtifacts,

    #[error("artifact {0} appears more than once in the inventory")]
    DuplicateArtifact(String),

    #[error("entity id {id} is declared by both {first} and {second}")]
    DuplicateEntity {
        id: String,
        first: String,
        second: String,
    },

    #[error("entity {id} claims artifact {claimed} but was extracted from {actual}")]
    MisplacedEntity {
        id: String,
        claimed: String,
        actual: String,
    },

    #[error("extractor {extractor} failed on {path}: {message}")]
    Extractor {
        extractor: String,
        path: String,
        message: String,
    },

    #[error("invalid requirement id pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
