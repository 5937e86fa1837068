//! Rule-file persistence: an ordered rule list plus a metadata block,
//! stored as TOML, one file per tier.
//!
//! The rule source is never written to disk — it is implied by which file
//! a rule lives in and stamped onto every rule at load time. Loading a
//! saved file and re-saving it reproduces the same rule set, order and
//! values; only the timestamp differs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use tally_core::{CategorizationRule, RuleSource};

const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse rules file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk container for one tier's rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Free-form provenance block: generation settings, statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<toml::value::Table>,
    #[serde(default)]
    pub rules: Vec<CategorizationRule>,
}

impl RuleFile {
    pub fn new(rules: Vec<CategorizationRule>) -> Self {
        RuleFile {
            version: FORMAT_VERSION.to_string(),
            description: None,
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
            metadata: None,
            rules,
        }
    }

    /// Strict load for callers that need the failure; most callers want
    /// [`load_rules`] instead.
    pub fn load(path: &Path) -> Result<RuleFile, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let mut file: RuleFile = toml::from_str(&content)?;
        if file.version != FORMAT_VERSION {
            tracing::warn!(
                version = %file.version,
                path = %path.display(),
                "rules file version may not be compatible"
            );
        }
        // Serde fills the source with its default; nothing meaningful was
        // on disk.
        for rule in &mut file.rules {
            rule.rule_source = RuleSource::default();
        }
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Load one tier's rules, stamping every rule with the tier's source. An
/// absent or malformed file is a warning and an empty tier, never a
/// failure: the engine must start regardless.
pub fn load_rules(path: &Path, source: RuleSource) -> Vec<CategorizationRule> {
    match RuleFile::load(path) {
        Ok(file) => {
            let mut rules = file.rules;
            for rule in &mut rules {
                rule.rule_source = source;
            }
            tracing::info!(count = rules.len(), path = %path.display(), %source, "loaded rules");
            rules
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), %source, "could not load rules: {e}");
            Vec::new()
        }
    }
}

/// Persist one tier's rules with an optional provenance block.
pub fn save_rules(
    path: &Path,
    rules: Vec<CategorizationRule>,
    metadata: Option<toml::value::Table>,
) -> Result<(), StoreError> {
    let mut file = RuleFile::new(rules);
    file.metadata = metadata;
    file.save(path)?;
    tracing::info!(count = file.rules.len(), path = %path.display(), "saved rules");
    Ok(())
}
