//! API configuration from the environment.
//!
//! The API key is never hardcoded: it comes from `OPENAI_API_KEY`, the way
//! a host application would inject it. Base URL and model id have working
//! defaults and can be overridden for self-hosted or proxy deployments.

use std::time::Duration;

use url::Url;

use crate::error::AnalysisError;

/// Default OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default vision-capable model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Hard ceiling on upload payload bytes (20 MB).
pub const MAX_IMAGE_SIZE: usize = 20 * 1024 * 1024;

/// Compression target for upload payloads (4 MB).
pub const TARGET_IMAGE_SIZE: usize = 4 * 1024 * 1024;

/// Token budget for one analysis completion.
pub const MAX_TOKENS: u32 = 1000;

/// Per-attempt request timeout. Not a cumulative budget across retries.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one vision API endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Build a config, validating that `base_url` parses as a URL.
    pub fn new(api_key: String, base_url: &str, model: String) -> Result<Self, AnalysisError> {
        Url::parse(base_url).map_err(|_| AnalysisError::InvalidResponse)?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens: MAX_TOKENS,
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Read configuration from the environment.
    ///
    /// `OPENAI_API_KEY` supplies the key (empty if unset; the client
    /// rejects empty keys before any network call). `MEALSCAN_BASE_URL`
    /// and `MEALSCAN_MODEL` override the defaults.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let base_url =
            std::env::var("MEALSCAN_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("MEALSCAN_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(api_key, &base_url, model)
    }

    /// Resolve the chat completions endpoint under the configured root.
    pub fn chat_completions_url(&self) -> Result<Url, AnalysisError> {
        Url::parse(&format!("{}/chat/completions", self.base_url))
            .map_err(|_| AnalysisError::InvalidResponse)
    }
}
