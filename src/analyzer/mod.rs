//! AI vision analysis pipeline for meal photos.

pub mod image_prep;
pub mod prompts;
pub mod session;
pub mod types;
pub mod vision;

pub use image_prep::{compress_image, create_thumbnail, image_to_base64};
pub use session::{AnalysisSession, AnalysisState};
pub use types::{ChatCompletionResponse, FoodAnalysis, Ingredient};
pub use vision::{RetryPolicy, VisionClient};
