//! Vision API client with bounded retries.
//!
//! One analysis call is a short state machine: an attempt is in flight,
//! then either resolves (success or terminal failure) or waits out a
//! backoff and goes around once more. Transport failures and 429/5xx
//! responses are the only retried outcomes; client errors and parse
//! failures are terminal on first sight.

use std::time::Duration;

use reqwest::Response;
use tracing::{debug, error, warn};
use url::Url;

use super::prompts::build_analysis_request;
use super::types::{ChatCompletionResponse, FoodAnalysis};
use crate::config::ApiConfig;
use crate::error::AnalysisError;

/// Retry schedule for one analysis call.
///
/// `base_delay` seeds the exponential backoff (base, 2x base, 4x base...);
/// `rate_limit_delay` is the flat wait for a 429 without a usable
/// `Retry-After` header. Injectable so tests can compress the schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            rate_limit_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given zero-based attempt index.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Client for the food analysis endpoint.
pub struct VisionClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl VisionClient {
    pub fn new(config: &ApiConfig) -> Result<Self, AnalysisError> {
        Self::with_retry_policy(config, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        config: &ApiConfig,
        retry: RetryPolicy,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AnalysisError::Network)?;

        Ok(Self {
            client,
            endpoint: config.chat_completions_url()?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retry,
        })
    }

    /// Analyze a food image and return structured nutritional information.
    ///
    /// `image_base64` is the compressed, base64-encoded JPEG payload from
    /// [`crate::analyzer::image_prep`]. Backoff waits suspend rather than
    /// block; dropping the returned future at any await point cancels the
    /// operation without resolving a result.
    pub async fn analyze_food_image(
        &self,
        image_base64: &str,
    ) -> Result<FoodAnalysis, AnalysisError> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::InvalidApiKey);
        }

        let body = build_analysis_request(&self.model, image_base64, self.max_tokens);
        let mut last_transport_error = None;

        for attempt in 0..self.retry.max_attempts {
            debug!(attempt, "sending analysis request");

            let response = match self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(&self.api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    if attempt + 1 < self.retry.max_attempts {
                        let delay = self.retry.backoff_delay(attempt);
                        warn!(attempt, ?delay, "transport error, backing off: {e}");
                        last_transport_error = Some(e);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    error!("transport error on final attempt: {e}");
                    return Err(AnalysisError::Network(e));
                }
            };

            let status = response.status().as_u16();
            debug!(attempt, status, "analysis response received");

            match status {
                200 => {
                    let bytes = response.bytes().await.map_err(AnalysisError::Network)?;
                    let wrapper: ChatCompletionResponse = serde_json::from_slice(&bytes)
                        .map_err(|e| {
                            error!("malformed response wrapper: {e}");
                            AnalysisError::InvalidResponse
                        })?;
                    return wrapper.extract_food_analysis();
                }

                // Client errors: never retried.
                400 | 401 | 403 => {
                    let message = read_error_message(response).await;
                    return Err(message
                        .map(AnalysisError::Api)
                        .unwrap_or(AnalysisError::InvalidApiKey));
                }

                429 => {
                    if attempt + 1 < self.retry.max_attempts {
                        let delay =
                            retry_after(&response).unwrap_or(self.retry.rate_limit_delay);
                        warn!(attempt, ?delay, "rate limited, backing off");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let message = read_error_message(response).await;
                    return Err(message
                        .map(AnalysisError::Api)
                        .unwrap_or(AnalysisError::RateLimited));
                }

                500..=599 => {
                    if attempt + 1 < self.retry.max_attempts {
                        let delay = self.retry.backoff_delay(attempt);
                        warn!(attempt, status, ?delay, "server error, backing off");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let message = read_error_message(response).await;
                    return Err(message
                        .map(AnalysisError::Api)
                        .unwrap_or(AnalysisError::Server));
                }

                _ => {
                    let message = read_error_message(response).await;
                    return Err(message
                        .map(AnalysisError::Api)
                        .unwrap_or(AnalysisError::InvalidResponse));
                }
            }
        }

        Err(last_transport_error
            .map(AnalysisError::Network)
            .unwrap_or(AnalysisError::InvalidResponse))
    }
}

/// Parse a `Retry-After` header as whole seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Read the failure body and extract a human-readable message from it.
async fn read_error_message(response: Response) -> Option<String> {
    let body = response.bytes().await.ok()?;
    parse_error_body(&body)
}

/// Best-effort extraction of `error.message` from an API failure body.
///
/// Quota/billing messages are rewritten into actionable guidance. A body
/// that is not the expected JSON shape is surfaced raw (when UTF-8) so
/// the caller still sees what the server said.
fn parse_error_body(body: &[u8]) -> Option<String> {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            if message.contains("quota") || message.contains("billing") {
                return Some(format!(
                    "OpenAI API Quota Exceeded\n\n\
                     You've exceeded your current OpenAI API quota. Please:\n\
                     1. Check your billing at https://platform.openai.com/account/billing\n\
                     2. Add payment method or increase your quota\n\
                     3. Wait for your quota to reset\n\n\
                     Original error: {message}"
                ));
            }
            return Some(message.to_string());
        }
    }

    std::str::from_utf8(body)
        .ok()
        .map(|raw| format!("API Error: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_is_geometric() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.rate_limit_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_error_body_plain_message() {
        let body = br#"{"error": {"message": "Incorrect API key provided"}}"#;
        assert_eq!(
            parse_error_body(body).unwrap(),
            "Incorrect API key provided"
        );
    }

    #[test]
    fn test_parse_error_body_rewrites_quota_messages() {
        let body = br#"{"error": {"message": "You exceeded your current quota"}}"#;
        let message = parse_error_body(body).unwrap();
        assert!(message.contains("Quota Exceeded"));
        assert!(message.contains("platform.openai.com/account/billing"));
        assert!(message.contains("You exceeded your current quota"));
    }

    #[test]
    fn test_parse_error_body_rewrites_billing_messages() {
        let body = br#"{"error": {"message": "billing hard limit reached"}}"#;
        let message = parse_error_body(body).unwrap();
        assert!(message.contains("Quota Exceeded"));
    }

    #[test]
    fn test_parse_error_body_falls_back_to_raw_text() {
        let body = b"service unavailable";
        assert_eq!(
            parse_error_body(body).unwrap(),
            "API Error: service unavailable"
        );
    }

    #[test]
    fn test_parse_error_body_json_without_message_falls_back() {
        let body = br#"{"detail": "boom"}"#;
        assert_eq!(
            parse_error_body(body).unwrap(),
            r#"API Error: {"detail": "boom"}"#
        );
    }

    #[test]
    fn test_parse_error_body_non_utf8_is_none() {
        assert!(parse_error_body(&[0xff, 0xfe, 0x80]).is_none());
    }
}
