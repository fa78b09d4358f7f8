//! Analysis lifecycle: analyze, edit, save.
//!
//! `AnalysisSession` owns one analysis from capture to persistence and
//! exposes its progress as an explicit [`AnalysisState`] value for
//! whatever presentation layer sits on top.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use super::image_prep;
use super::types::{FoodAnalysis, Ingredient};
use super::vision::VisionClient;
use crate::history::{FoodLogRecord, FoodLogStore};

/// Progress of one analysis invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Idle,
    Pending,
    Success(FoodAnalysis),
    Failure(String),
}

/// One analysis lifecycle around a [`VisionClient`].
pub struct AnalysisSession {
    client: VisionClient,
    state: AnalysisState,
}

impl AnalysisSession {
    pub fn new(client: VisionClient) -> Self {
        Self {
            client,
            state: AnalysisState::Idle,
        }
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn analysis(&self) -> Option<&FoodAnalysis> {
        match &self.state {
            AnalysisState::Success(analysis) => Some(analysis),
            _ => None,
        }
    }

    fn analysis_mut(&mut self) -> Option<&mut FoodAnalysis> {
        match &mut self.state {
            AnalysisState::Success(analysis) => Some(analysis),
            _ => None,
        }
    }

    /// Analyze an already-encoded image payload.
    pub async fn analyze(&mut self, image_base64: &str) -> &AnalysisState {
        self.state = AnalysisState::Pending;
        self.state = match self.client.analyze_food_image(image_base64).await {
            Ok(analysis) => {
                info!(
                    "Analysis succeeded: {} ingredients, {} kcal",
                    analysis.ingredients.len(),
                    analysis.total_calories
                );
                AnalysisState::Success(analysis)
            }
            Err(e) => AnalysisState::Failure(e.to_string()),
        };
        &self.state
    }

    /// Decode, compress, and analyze a raw captured image.
    pub async fn analyze_image_bytes(&mut self, image_bytes: &[u8]) -> &AnalysisState {
        let payload = image::load_from_memory(image_bytes)
            .ok()
            .as_ref()
            .and_then(image_prep::image_to_base64);

        match payload {
            Some(encoded) => self.analyze(&encoded).await,
            None => {
                self.state =
                    AnalysisState::Failure("Failed to prepare image for upload".to_string());
                &self.state
            }
        }
    }

    /// Add an ingredient; starts a fresh snack analysis when none exists.
    pub fn add_ingredient(&mut self, ingredient: Ingredient) {
        if let Some(analysis) = self.analysis_mut() {
            analysis.add_ingredient(ingredient);
            return;
        }

        let total = ingredient.calories;
        self.state = AnalysisState::Success(FoodAnalysis {
            ingredients: vec![ingredient],
            total_calories: total,
            meal_type: "snack".to_string(),
            description: String::new(),
        });
    }

    pub fn update_ingredient(
        &mut self,
        index: usize,
        name: String,
        quantity: f64,
        unit: String,
    ) -> bool {
        self.analysis_mut()
            .map(|a| a.update_ingredient(index, name, quantity, unit))
            .unwrap_or(false)
    }

    pub fn remove_ingredient(&mut self, index: usize) -> bool {
        self.analysis_mut()
            .map(|a| a.remove_ingredient(index))
            .unwrap_or(false)
    }

    pub fn set_meal_type(&mut self, meal_type: String) {
        if let Some(analysis) = self.analysis_mut() {
            analysis.meal_type = meal_type;
        }
    }

    pub fn set_description(&mut self, description: String) {
        if let Some(analysis) = self.analysis_mut() {
            analysis.description = description;
        }
    }

    pub fn clear(&mut self) {
        self.state = AnalysisState::Idle;
    }

    /// Persist the current analysis as a food log record.
    ///
    /// A thumbnail is derived from `image_bytes` when provided.
    pub fn save(
        &self,
        store: &FoodLogStore,
        image_bytes: Option<&[u8]>,
        logged_at: DateTime<Utc>,
    ) -> Result<FoodLogRecord> {
        let Some(analysis) = self.analysis() else {
            bail!("No analysis to save");
        };

        let thumbnail = image_bytes
            .and_then(|bytes| image_prep::create_thumbnail(bytes, image_prep::THUMBNAIL_MAX_DIMENSION));

        store
            .save_log(analysis, thumbnail.as_deref(), logged_at)
            .context("Failed to save food log")
    }
}
