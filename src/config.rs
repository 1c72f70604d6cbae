//! Audit configuration for docfresh

use crate::drift::Severity;
use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Directory holding docfresh state inside a repository
pub const CONFIG_DIR: &str = ".docfresh";

/// Configuration for an audit run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Entity matching thresholds and signal weights
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Severity weights for freshness scores
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Drift rule parameters
    #[serde(default)]
    pub rules: RuleConfig,

    /// Documentation classification
    #[serde(default)]
    pub docs: DocConfig,
}

/// Entity matcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum combined score for a link to be kept (0.0 - 1.0)
    #[serde(default = "default_link_threshold")]
    pub link_threshold: f64,

    /// Weight of the name signal
    #[serde(default = "default_name_weight")]
    pub name_weight: f64,

    /// Weight of the explicit reference signal
    #[serde(default = "default_reference_weight")]
    pub reference_weight: f64,

    /// Weight of the parameter overlap signal
    #[serde(default = "default_param_weight")]
    pub param_weight: f64,

    /// Weight of the artifact-type prior
    #[serde(default = "default_prior_weight")]
    pub prior_weight: f64,
}

/// Freshness score configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Points deducted per critical issue
    #[serde(default = "default_critical_weight")]
    pub critical: u32,

    /// Points deducted per major issue
    #[serde(default = "default_major_weight")]
    pub major: u32,

    /// Points deducted per minor issue
    #[serde(default = "default_minor_weight")]
    pub minor: u32,

    /// Maximum score for an artifact that failed to decode
    #[serde(default = "default_encoding_cap")]
    pub encoding_cap: u32,
}

/// Drift rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Pattern identifying requirement IDs in requirement specs
    #[serde(default = "default_requirement_id_pattern")]
    pub requirement_id_pattern: String,

    /// Markers that flag an implementation as incomplete
    #[serde(default = "default_open_markers")]
    pub open_markers: Vec<String>,

    /// Parameter name fragments that carry validation/safety semantics
    #[serde(default = "default_safety_keywords")]
    pub safety_keywords: Vec<String>,
}

/// Documentation classification for the Markdown extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocConfig {
    /// Path patterns for requirement specifications (glob patterns)
    #[serde(default = "default_requirement_patterns")]
    pub requirement_patterns: Vec<String>,

    /// Path patterns for interface contracts (glob patterns)
    #[serde(default = "default_contract_patterns")]
    pub contract_patterns: Vec<String>,
}

fn default_link_threshold() -> f64 {
    0.5
}

fn default_name_weight() -> f64 {
    0.4
}

fn default_reference_weight() -> f64 {
    0.3
}

fn default_param_weight() -> f64 {
    0.2
}

fn default_prior_weight() -> f64 {
    0.1
}

fn default_critical_weight() -> u32 {
    60
}

fn default_major_weight() -> u32 {
    20
}

fn default_minor_weight() -> u32 {
    7
}

fn default_encoding_cap() -> u32 {
    10
}

fn default_requirement_id_pattern() -> String {
    r"\b(?:REQ|FR|NFR|SR|US)-\d+\b".to_string()
}

fn default_open_markers() -> Vec<String> {
    vec![
        "not yet implemented".to_string(),
        "not implemented".to_string(),
        "NotImplementedError".to_string(),
        "unimplemented!".to_string(),
        "todo!(".to_string(),
        "TODO: validate".to_string(),
    ]
}

fn default_safety_keywords() -> Vec<String> {
    vec![
        "validate".to_string(),
        "strict".to_string(),
        "safe".to_string(),
        "sanitize".to_string(),
        "verify".to_string(),
        "auth".to_string(),
        "token".to_string(),
        "secret".to_string(),
        "password".to_string(),
        "permission".to_string(),
        "limit".to_string(),
        "timeout".to_string(),
    ]
}

fn default_requirement_patterns() -> Vec<String> {
    vec![
        "*requirements*".to_string(),
        "SPEC*".to_string(),
        "PRD*".to_string(),
        "docs/requirements/**".to_string(),
    ]
}

fn default_contract_patterns() -> Vec<String> {
    vec![
        "openapi*".to_string(),
        "swagger*".to_string(),
        "*contract*".to_string(),
        "docs/api/**".to_string(),
    ]
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            link_threshold: default_link_threshold(),
            name_weight: default_name_weight(),
            reference_weight: default_reference_weight(),
            param_weight: default_param_weight(),
            prior_weight: default_prior_weight(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            critical: default_critical_weight(),
            major: default_major_weight(),
            minor: default_minor_weight(),
            encoding_cap: default_encoding_cap(),
        }
    }
}

impl ScoringConfig {
    /// Points deducted for one issue of the given severity
    pub fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Major => self.major,
            Severity::Minor => self.minor,
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            requirement_id_pattern: default_requirement_id_pattern(),
            open_markers: default_open_markers(),
            safety_keywords: default_safety_keywords(),
        }
    }
}

impl Default for DocConfig {
    fn default() -> Self {
        Self {
            requirement_patterns: default_requirement_patterns(),
            contract_patterns: default_contract_patterns(),
        }
    }
}

impl AuditConfig {
    /// Load configuration from the repository or return defaults
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_DIR).join("config.toml");

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let config: AuditConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the repository
    pub fn save(&self, repo_root: &Path) -> Result<()> {
        let config_dir = repo_root.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create {:?}", config_dir))?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        if !(0.0..=1.0).contains(&m.link_threshold) {
            anyhow::bail!("matching.link_threshold must be within 0.0 - 1.0, got {}", m.link_threshold);
        }

        let weights = [m.name_weight, m.reference_weight, m.param_weight, m.prior_weight];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            anyhow::bail!("matching weights must be non-negative and not all zero");
        }

        let s = &self.scoring;
        if [s.critical, s.major, s.minor, s.encoding_cap].iter().any(|w| *w > 100) {
            anyhow::bail!("scoring weights and scoring.encoding_cap must be at most 100");
        }

        for pattern in self.docs.requirement_patterns.iter().chain(&self.docs.contract_patterns) {
            path_glob(pattern).with_context(|| format!("Invalid docs path pattern: {}", pattern))?;
        }

        Regex::new(&self.rules.requirement_id_pattern).with_context(|| {
            format!(
                "Invalid rules.requirement_id_pattern: {}",
                self.rules.requirement_id_pattern
            )
        })?;

        Ok(())
    }
}

/// Build a case-insensitive glob for a path pattern
///
/// `*` stays within a path segment, `**` crosses segments. Patterns without a
/// `/` are matched against the file name only.
fn path_glob(pattern: &str) -> std::result::Result<Glob, globset::Error> {
    let pattern = pattern.trim_start_matches("./");
    let anchored = if pattern.contains('/') {
        pattern.to_string()
    } else {
        format!("**/{}", pattern)
    };

    GlobBuilder::new(&anchored)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
}

/// Compile path patterns into a single matcher, skipping invalid ones
pub fn compile_patterns(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match path_glob(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!("Ignoring invalid path pattern {}: {}", pattern, e),
        }
    }

    builder.build().unwrap_or_else(|e| {
        tracing::warn!("Failed to compile path patterns: {}", e);
        GlobSet::empty()
    })
}
