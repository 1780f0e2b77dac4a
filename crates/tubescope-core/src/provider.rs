use crate::error::{Result, TubescopeError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    Grok,
    Openai,
    #[default]
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    /// Tried in order until one answers.
    pub models: &'static [&'static str],
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                models: &["grok-4-fast", "grok-3-mini"],
                env_var: "XAI_API_KEY",
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                models: &["gpt-5.1", "gpt-4.1-mini"],
                env_var: "OPENAI_API_KEY",
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                models: &["gemini-flash-latest", "gemini-2.5-flash", "gemini-2.0-flash"],
                env_var: "GEMINI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Grok => "Grok",
            Provider::Openai => "OpenAI",
            Provider::Gemini => "Gemini",
        }
    }

    /// Short lowercase identifier, used in cache file names
    pub fn slug(&self) -> &'static str {
        match self {
            Provider::Grok => "grok",
            Provider::Openai => "openai",
            Provider::Gemini => "gemini",
        }
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String> {
        let config = self.config();
        match std::env::var(config.env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(TubescopeError::MissingApiKey {
                env_var: config.env_var.to_string(),
            }),
        }
    }
}
