use crate::domain::error::BackendError;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The analysis service reports energy in units that are 20 kcal each.
pub const ENERGY_TO_CALORIES: f64 = 20.0;

const MAX_RATING: f64 = 10.0;

/// Answer of the label analysis service: `[rating, {NUTRIENT: value, ...}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub rating: f64,
    pub nutrients: BTreeMap<String, f64>,
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

impl AnalysisReport {
    pub fn from_json(value: &Value) -> Result<Self, BackendError> {
        let items = match value {
            Value::Array(items) if items.len() == 2 => items,
            other => {
                return Err(BackendError::MalformedResponse(format!(
                    "expected a [rating, nutrients] array, got {}",
                    describe(other)
                )))
            }
        };

        let rating = number_from(&items[0]).ok_or_else(|| {
            BackendError::MalformedResponse(format!("rating is not numeric: {}", items[0]))
        })?;

        let map = items[1].as_object().ok_or_else(|| {
            BackendError::MalformedResponse(format!(
                "nutrients must be an object, got {}",
                describe(&items[1])
            ))
        })?;

        let mut nutrients = BTreeMap::new();
        for (key, raw) in map {
            match number_from(raw) {
                Some(v) => {
                    nutrients.insert(key.clone(), v);
                }
                None => debug!("Skipping non-numeric nutrient {}={}", key, raw),
            }
        }

        Ok(Self { rating, nutrients })
    }

    pub fn nutrient(&self, key: &str) -> Option<f64> {
        self.nutrients.get(key).copied()
    }

    pub fn final_rating(&self) -> f64 {
        self.nutrient("FINAL_RATING").unwrap_or(self.rating)
    }

    pub fn calories(&self) -> f64 {
        self.nutrient("ENERGY").map(|e| e * ENERGY_TO_CALORIES).unwrap_or(0.0)
    }

    /// Rating as a 0..=100 progress value.
    pub fn rating_percent(&self) -> f64 {
        self.rating.clamp(0.0, MAX_RATING) * 10.0
    }

    pub fn exercise_times(&self) -> ExerciseTimes {
        ExerciseTimes::for_calories(self.calories())
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array of the wrong length",
        Value::Object(_) => "an object",
    }
}

/// Minutes of each activity needed to burn a calorie amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTimes {
    pub walking: f64,
    pub jogging: f64,
    pub cycling: f64,
    pub swimming: f64,
}

impl ExerciseTimes {
    // kcal / 分
    const WALKING: f64 = 5.0;
    const JOGGING: f64 = 10.0;
    const CYCLING: f64 = 8.0;
    const SWIMMING: f64 = 9.0;

    pub fn for_calories(calories: f64) -> Self {
        let minutes = |per_minute: f64| (calories / per_minute * 100.0).round() / 100.0;
        Self {
            walking: minutes(Self::WALKING),
            jogging: minutes(Self::JOGGING),
            cycling: minutes(Self::CYCLING),
            swimming: minutes(Self::SWIMMING),
        }
    }
}
