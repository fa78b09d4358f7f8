use thiserror::Error;

/// Errors surfaced by the vision analysis pipeline.
///
/// Transport failures, 429 and 5xx responses are retried internally and
/// only reach callers once retries are exhausted. Everything else is
/// terminal on first occurrence.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid API key. Please check your configuration.")]
    InvalidApiKey,

    #[error("Network error. Please check your connection.")]
    Network(#[source] reqwest::Error),

    #[error("Invalid response from API. Please try again.")]
    InvalidResponse,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Server error. Please try again later.")]
    Server,

    /// Detail extracted from an API error body.
    #[error("{0}")]
    Api(String),
}

impl From<AnalysisError> for String {
    fn from(err: AnalysisError) -> Self {
        err.to_string()
    }
}
