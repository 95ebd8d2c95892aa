//! HuggingFace token handling.
//!
//! Resolution order matches the Python tooling: `HF_TOKEN`, then
//! `HUGGINGFACE_HUB_TOKEN`, then the token file written by
//! `huggingface-cli login`. Validation queries the Hub's whoami endpoint;
//! gated models (Meta-Llama, Mistral, ...) need a valid token, public
//! ones do not.

use crate::error::{CacheError, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

const WHOAMI_URL: &str = "https://huggingface.co/api/whoami-v2";

/// Identity reported by the Hub for a valid token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenIdentity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Find a token from the environment or the huggingface-cli token file
#[must_use]
pub fn resolve_token() -> Option<String> {
    for var in ["HF_TOKEN", "HUGGINGFACE_HUB_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                return Some(token);
            }
        }
    }

    // Token stored by `huggingface-cli login`
    let path = dirs::home_dir()?.join(".cache/huggingface/token");
    fs::read_to_string(path)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Validate a token against the Hub, returning who it belongs to
pub async fn validate_token(token: &str) -> Result<TokenIdentity> {
    let client = reqwest::Client::new();

    let response = client
        .get(WHOAMI_URL)
        .bearer_auth(token)
        .timeout(Duration::from_secs(15))
        .send()
        .await
        .map_err(|e| CacheError::Token(format!("network error reaching the Hub: {e}")))?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Err(CacheError::Token(
            "token rejected by the Hub (invalid or expired)".to_string(),
        ));
    }

    let response = response
        .error_for_status()
        .map_err(|e| CacheError::Token(format!("unexpected Hub response: {e}")))?;

    response
        .json::<TokenIdentity>()
        .await
        .map_err(|e| CacheError::Token(format!("malformed whoami response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_resolve_prefers_hf_token() {
        std::env::set_var("HF_TOKEN", "hf_primary");
        std::env::set_var("HUGGINGFACE_HUB_TOKEN", "hf_legacy");

        assert_eq!(resolve_token(), Some("hf_primary".to_string()));

        std::env::remove_var("HF_TOKEN");
        assert_eq!(resolve_token(), Some("hf_legacy".to_string()));

        std::env::remove_var("HUGGINGFACE_HUB_TOKEN");
    }

    #[test]
    #[serial]
    fn test_resolve_ignores_empty_env() {
        std::env::set_var("HF_TOKEN", "   ");
        std::env::set_var("HUGGINGFACE_HUB_TOKEN", "hf_legacy");

        assert_eq!(resolve_token(), Some("hf_legacy".to_string()));

        std::env::remove_var("HF_TOKEN");
        std::env::remove_var("HUGGINGFACE_HUB_TOKEN");
    }

    #[test]
    fn test_identity_deserializes() {
        let identity: TokenIdentity =
            serde_json::from_str(r#"{"name": "someone", "type": "user"}"#).unwrap();
        assert_eq!(identity.name, "someone");
        assert_eq!(identity.kind.as_deref(), Some("user"));
    }
}
