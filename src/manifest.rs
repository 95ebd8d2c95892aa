//! Download manifest parsing.
//!
//! A manifest is a plain text file listing models and datasets to cache,
//! one entry per line:
//!
//! ```text
//! # Models (just the repo id)
//! Qwen/Qwen2.5-0.5B-Instruct
//!
//! # Datasets: name[,config[,split]]
//! dataset:hellaswag
//! dataset:cais/mmlu,all
//! dataset:trl-lib/Capybara,,train
//! ```
//!
//! Parsing is pure: the same text always yields the same entry sequence,
//! and malformed lines are collected across the whole file so the user
//! sees every mistake in one pass instead of one fetch at a time.

use crate::error::{CacheError, MalformedEntry, Result};

/// Prefix marking a dataset line
pub const DATASET_PREFIX: &str = "dataset:";

/// One entry of a download manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    /// A model repo id, e.g. `Qwen/Qwen2.5-0.5B`
    Model { identifier: String },
    /// A dataset repo id with optional config (subset) and split
    Dataset {
        identifier: String,
        config: Option<String>,
        split: Option<String>,
    },
}

impl ManifestEntry {
    /// The repo identifier, ignoring config/split
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Model { identifier } | Self::Dataset { identifier, .. } => identifier,
        }
    }

    /// Key for the repo directory this entry writes into, ignoring
    /// config/split. Distinct subsets of one dataset land in the same
    /// directory, so entries sharing this key must never be fetched
    /// concurrently.
    #[must_use]
    pub fn repo_key(&self) -> String {
        match self {
            Self::Model { identifier } => format!("model:{identifier}"),
            Self::Dataset { identifier, .. } => format!("dataset:{identifier}"),
        }
    }

    /// Key identifying one requested artifact, config and split included.
    ///
    /// The synchronizer deduplicates on this so a repeated manifest line
    /// is acquired once.
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::Model { identifier } => format!("model:{identifier}"),
            Self::Dataset {
                identifier,
                config,
                split,
            } => format!(
                "dataset:{identifier},{},{}",
                config.as_deref().unwrap_or_default(),
                split.as_deref().unwrap_or_default()
            ),
        }
    }
}

impl std::fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model { identifier } => write!(f, "model {identifier}"),
            Self::Dataset {
                identifier,
                config,
                split,
            } => {
                write!(f, "dataset {identifier}")?;
                if let Some(config) = config {
                    write!(f, " (config={config})")?;
                }
                if let Some(split) = split {
                    write!(f, " (split={split})")?;
                }
                Ok(())
            }
        }
    }
}

/// Parse manifest text into entries, preserving input order.
///
/// Returns `CacheError::Manifest` carrying every malformed line with its
/// line number if any line fails to parse; no entries are returned in
/// that case (batch-level fail-fast).
pub fn parse(text: &str) -> Result<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    let mut malformed = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok(entry) => entries.push(entry),
            Err(reason) => malformed.push(MalformedEntry {
                line: idx + 1,
                content: line.to_string(),
                reason,
            }),
        }
    }

    if malformed.is_empty() {
        Ok(entries)
    } else {
        Err(CacheError::Manifest(malformed))
    }
}

/// Parse a single non-empty, non-comment line
fn parse_line(line: &str) -> std::result::Result<ManifestEntry, String> {
    if let Some(rest) = line.strip_prefix(DATASET_PREFIX) {
        // dataset:name[,config[,split]] - extra fields are ignored
        let fields: Vec<&str> = rest.split(',').map(str::trim).collect();

        let identifier = fields.first().copied().unwrap_or_default();
        if identifier.is_empty() {
            return Err("dataset entry has no identifier".to_string());
        }
        check_identifier(identifier)?;

        // Empty fields between commas mean "unspecified", not empty string
        let config = fields
            .get(1)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let split = fields
            .get(2)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);

        Ok(ManifestEntry::Dataset {
            identifier: identifier.to_string(),
            config,
            split,
        })
    } else {
        check_identifier(line)?;
        Ok(ManifestEntry::Model {
            identifier: line.to_string(),
        })
    }
}

fn check_identifier(identifier: &str) -> std::result::Result<(), String> {
    if identifier.chars().any(char::is_whitespace) {
        Err("identifier contains whitespace".to_string())
    } else {
        Ok(())
    }
}
