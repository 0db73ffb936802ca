use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use virobench_core::error::ConfigError;

/// Identifier for a completion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Claude,
}

impl Provider {
    /// Model used when the caller does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4.1-mini",
            Provider::Claude => "claude-sonnet-4-5-20250929",
        }
    }

    /// Environment variable conventionally holding this provider's API key.
    ///
    /// Backends never read it themselves; the binary looks it up once and
    /// passes the key down explicitly.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "claude" | "anthropic" => Ok(Provider::Claude),
            _ => Err(ConfigError::UnknownProvider(s.into())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "openai"),
            Provider::Claude => write!(f, "claude"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_serialize_openai() {
        let json = serde_json::to_string(&Provider::OpenAI).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn provider_serialize_claude() {
        let json = serde_json::to_string(&Provider::Claude).unwrap();
        assert_eq!(json, "\"claude\"");
    }

    #[test]
    fn provider_deserialize() {
        let p: Provider = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(p, Provider::OpenAI);
        let p: Provider = serde_json::from_str("\"claude\"").unwrap();
        assert_eq!(p, Provider::Claude);
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!("Claude".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Claude);
    }

    #[test]
    fn provider_from_str_unknown() {
        let err = "grok".parse::<Provider>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(ref s) if s == "grok"));
    }

    #[test]
    fn provider_display_roundtrips_through_from_str() {
        for p in [Provider::OpenAI, Provider::Claude] {
            assert_eq!(p.to_string().parse::<Provider>().unwrap(), p);
        }
    }

    #[test]
    fn provider_api_key_env() {
        assert_eq!(Provider::OpenAI.api_key_env(), "OPENAI_API_KEY");
        assert_eq!(Provider::Claude.api_key_env(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn provider_default_model_nonempty() {
        assert!(!Provider::OpenAI.default_model().is_empty());
        assert!(!Provider::Claude.default_model().is_empty());
    }
}
