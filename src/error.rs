use std::path::PathBuf;
use thiserror::Error;

/// A single manifest line that failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    pub line: usize,
    pub content: String,
    pub reason: String,
}

impl std::fmt::Display for MalformedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: '{}' ({})", self.line, self.content, self.reason)
    }
}

/// Main error type for hfcache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Malformed manifest entries:\n{}\n\nTroubleshooting:\n- Models are one repo id per line (e.g. Qwen/Qwen2.5-0.5B)\n- Datasets are 'dataset:name[,config[,split]]'\n- Comments start with '#'", format_malformed(.0))]
    Manifest(Vec<MalformedEntry>),

    #[error("Failed to acquire '{identifier}': {cause}")]
    Acquisition {
        identifier: String,
        cause: anyhow::Error,
    },

    #[error("Cache root unavailable: {path}: {reason}\n\nTroubleshooting:\n- Check the directory is writable (quota exceeded?)\n- Set the cache root via --cache-root, config.toml, or HF_HOME")]
    CacheUnavailable { path: PathBuf, reason: String },

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/hfcache/config.toml\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("Token error: {0}\n\nTroubleshooting:\n- Set HF_TOKEN or HUGGINGFACE_HUB_TOKEN\n- Or run: huggingface-cli login\n- Get a token at: https://huggingface.co/settings/tokens")]
    Token(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_malformed(entries: &[MalformedEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_error_lists_all_lines() {
        let err = CacheError::Manifest(vec![
            MalformedEntry {
                line: 2,
                content: "dataset:".to_string(),
                reason: "dataset entry has no identifier".to_string(),
            },
            MalformedEntry {
                line: 5,
                content: "bad id".to_string(),
                reason: "identifier contains whitespace".to_string(),
            },
        ]);

        let msg = err.to_string();
        assert!(msg.contains("line 2"));
        assert!(msg.contains("line 5"));
    }

    #[test]
    fn test_acquisition_error_preserves_cause() {
        let err = CacheError::Acquisition {
            identifier: "org/model".to_string(),
            cause: anyhow::anyhow!("connection refused"),
        };
        let msg = err.to_string();
        assert!(msg.contains("org/model"));
        assert!(msg.contains("connection refused"));
    }
}
