//! A single named completion endpoint profile.

use serde::{Deserialize, Serialize};

/// Model used when a profile does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Credentials and endpoint for one completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// API key sent as a bearer token. Empty means "not configured".
    #[serde(default)]
    pub api_key: String,

    /// Base URL of an OpenAI compatible endpoint. `None` uses the provider default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self { api_key: String::new(), base_url: None, model: default_model() }
    }
}

impl Profile {
    /// Creates a profile with the given key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), base_url: None, model: model.into() }
    }

    /// Sets a custom base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// True if the profile has an API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// API key with everything but the last four characters masked.
    pub fn masked_api_key(&self) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return "(not set)".to_string();
        }
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_uses_default() {
        let profile: Profile = toml::from_str(r#"api_key = "sk-1""#).unwrap();
        assert_eq!(profile.model, DEFAULT_MODEL);
        assert!(profile.base_url.is_none());
        assert!(profile.is_configured());
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        assert!(!Profile::new("   ", "gpt-4o").is_configured());
    }

    #[test]
    fn test_masked_api_key() {
        assert_eq!(Profile::new("sk-abcdef1234", "m").masked_api_key(), "*********1234");
        assert_eq!(Profile::new("abc", "m").masked_api_key(), "***");
        assert_eq!(Profile::default().masked_api_key(), "(not set)");
    }
}
