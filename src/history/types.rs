use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analyzer::{FoodAnalysis, Ingredient};

/// A persisted food log entry.
#[derive(Debug, Clone, Serialize)]
pub struct FoodLogRecord {
    pub id: Uuid,
    /// When the meal was eaten (not when the record was written).
    pub logged_at: DateTime<Utc>,
    pub meal_type: String,
    pub total_calories: f64,
    pub description: String,
    /// Ingredient list as JSON, the shape the analyzer emits.
    pub ingredients_json: String,
    #[serde(skip)]
    pub thumbnail_jpeg: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FoodLogRecord {
    /// Rehydrate the stored record into an editable analysis.
    pub fn to_analysis(&self) -> Result<FoodAnalysis> {
        let ingredients: Vec<Ingredient> = if self.ingredients_json.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&self.ingredients_json)
                .context("Failed to decode stored ingredients")?
        };

        Ok(FoodAnalysis {
            ingredients,
            total_calories: self.total_calories,
            meal_type: self.meal_type.clone(),
            description: self.description.clone(),
        })
    }
}
