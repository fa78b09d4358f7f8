//! Data model for food analysis results and the API response wrapper.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::AnalysisError;

/// One food component within an analysis.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub calories: f64,
}

impl Ingredient {
    pub fn new(name: String, quantity: f64, unit: String, calories: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            quantity,
            unit,
            calories,
        }
    }

    /// Calories per unit of quantity; 0 when quantity is not positive.
    pub fn calories_per_unit(&self) -> f64 {
        if self.quantity > 0.0 {
            self.calories / self.quantity
        } else {
            0.0
        }
    }
}

/// Wire shape with a tolerant `id` slot. The model frequently omits ids
/// or invents non-UUID ones; neither may fail the whole decode.
#[derive(Deserialize)]
struct IngredientWire {
    #[serde(default)]
    id: serde_json::Value,
    name: String,
    quantity: f64,
    unit: String,
    calories: f64,
}

impl<'de> Deserialize<'de> for Ingredient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = IngredientWire::deserialize(deserializer)?;
        let id = match &wire.id {
            serde_json::Value::Null => Uuid::new_v4(),
            serde_json::Value::String(s) => Uuid::parse_str(s).unwrap_or_else(|_| {
                warn!("Replacing malformed ingredient id {:?}", s);
                Uuid::new_v4()
            }),
            other => {
                warn!("Replacing non-string ingredient id {}", other);
                Uuid::new_v4()
            }
        };

        Ok(Ingredient {
            id,
            name: wire.name,
            quantity: wire.quantity,
            unit: wire.unit,
            calories: wire.calories,
        })
    }
}

/// Structured output of one image analysis.
///
/// `meal_type` is an open string: the API usually returns
/// breakfast/lunch/dinner/snack but is not limited to those.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FoodAnalysis {
    pub ingredients: Vec<Ingredient>,
    pub total_calories: f64,
    pub meal_type: String,
    pub description: String,
}

impl FoodAnalysis {
    /// Recompute the total from the ingredient list. Edits never carry
    /// their own total; this is the only source of truth.
    pub fn update_total_calories(&mut self) {
        self.total_calories = self.ingredients.iter().map(|i| i.calories).sum();
    }

    pub fn add_ingredient(&mut self, ingredient: Ingredient) {
        self.ingredients.push(ingredient);
        self.update_total_calories();
    }

    /// Update an ingredient in place, re-deriving its calories from the
    /// previous calories-per-unit rate and the new quantity.
    ///
    /// Returns false when the index is out of bounds.
    pub fn update_ingredient(
        &mut self,
        index: usize,
        name: String,
        quantity: f64,
        unit: String,
    ) -> bool {
        let Some(ingredient) = self.ingredients.get_mut(index) else {
            return false;
        };

        let calories_per_unit = ingredient.calories_per_unit();
        ingredient.name = name;
        ingredient.quantity = quantity;
        ingredient.unit = unit;
        ingredient.calories = calories_per_unit * quantity;

        self.update_total_calories();
        true
    }

    /// Returns false when the index is out of bounds.
    pub fn remove_ingredient(&mut self, index: usize) -> bool {
        if index >= self.ingredients.len() {
            return false;
        }
        self.ingredients.remove(index);
        self.update_total_calories();
        true
    }
}

/// Chat-completions response wrapper: the analysis JSON travels as an
/// encoded string inside `choices[0].message.content`.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: String,
}

impl ChatCompletionResponse {
    /// Extract the nested analysis from the first choice.
    pub fn extract_food_analysis(&self) -> Result<FoodAnalysis, AnalysisError> {
        let first = self.choices.first().ok_or(AnalysisError::InvalidResponse)?;
        parse_food_analysis(&first.message.content)
    }
}

/// Decode the nested content string as a `FoodAnalysis`.
///
/// Decoding is staged so structural failures can name the offending
/// field path: the outer object first, then each ingredient element
/// individually. Failures carry a truncated prefix of the raw content.
pub fn parse_food_analysis(content: &str) -> Result<FoodAnalysis, AnalysisError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AnalysisWire {
        ingredients: Vec<serde_json::Value>,
        total_calories: f64,
        meal_type: String,
        description: String,
    }

    let wire: AnalysisWire =
        serde_json::from_str(content).map_err(|e| decode_error(&e.to_string(), content))?;

    let mut ingredients = Vec::with_capacity(wire.ingredients.len());
    for (index, value) in wire.ingredients.into_iter().enumerate() {
        let ingredient: Ingredient = serde_json::from_value(value)
            .map_err(|e| decode_error(&format!("ingredients[{index}]: {e}"), content))?;
        ingredients.push(ingredient);
    }

    Ok(FoodAnalysis {
        ingredients,
        total_calories: wire.total_calories,
        meal_type: wire.meal_type,
        description: wire.description,
    })
}

fn decode_error(detail: &str, content: &str) -> AnalysisError {
    let prefix: String = content.chars().take(200).collect();
    AnalysisError::Api(format!(
        "Failed to parse API response: {detail}. Raw content: {prefix}"
    ))
}
