//! Backend for a meal-photo nutrition tracker: image preparation,
//! vision API analysis with bounded retries, tolerant result parsing,
//! and a local food log.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod history;

pub use analyzer::{AnalysisSession, AnalysisState, FoodAnalysis, Ingredient, VisionClient};
pub use config::ApiConfig;
pub use error::AnalysisError;
pub use history::{FoodLogRecord, FoodLogStore};

/// Install the default tracing subscriber for host applications.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
