use std::time::Duration;

use crate::{
    error::{Result, TubescopeError},
    provider::Provider,
    youtube::MAX_RESULTS_PER_PAGE,
};

pub const YOUTUBE_API_KEY_ENV: &str = "YOUTUBE_API_KEY";
pub const DEFAULT_VIDEO_LIMIT: usize = MAX_RESULTS_PER_PAGE;
pub const DEFAULT_REPORT_LANG: &str = "en";
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one analysis run, resolved from flags and the environment.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub youtube_api_key: String,
    pub provider: Provider,
    pub provider_api_key: String,
    pub report_lang: String,
    pub video_limit: usize,
    pub probe_timeout: Duration,
    pub completion_timeout: Duration,
}

impl AnalyzerConfig {
    /// Resolve keys, falling back to environment variables when no explicit
    /// key was given.
    pub fn resolve(
        youtube_api_key: Option<String>,
        provider: Provider,
        report_lang: Option<String>,
        video_limit: usize,
    ) -> Result<Self> {
        let youtube_api_key = match youtube_api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => std::env::var(YOUTUBE_API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| TubescopeError::MissingApiKey {
                    env_var: YOUTUBE_API_KEY_ENV.to_string(),
                })?,
        };
        let provider_api_key = provider.validate_api_key()?;

        if video_limit == 0 {
            return Err(TubescopeError::InvalidInput {
                reason: "video limit must be at least 1".to_string(),
            });
        }

        Ok(Self {
            youtube_api_key,
            provider,
            provider_api_key,
            report_lang: report_lang.unwrap_or_else(|| DEFAULT_REPORT_LANG.to_string()),
            video_limit,
            probe_timeout: PROBE_TIMEOUT,
            completion_timeout: COMPLETION_TIMEOUT,
        })
    }
}
