use serde::{Deserialize, Serialize};

/// Structured answer of the dietary advice model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionAdvice {
    #[serde(rename = "Evaluation")]
    pub evaluation: String,
    #[serde(rename = "Recommendations")]
    pub recommendations: String,
    #[serde(rename = "Alternatives", default)]
    pub alternatives: Vec<String>,
}

impl NutritionAdvice {
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Evaluation: {}\nRecommendations: {}",
            self.evaluation, self.recommendations
        );
        if !self.alternatives.is_empty() {
            text.push_str("\nAlternatives: ");
            text.push_str(&self.alternatives.join(", "));
        }
        text
    }
}
