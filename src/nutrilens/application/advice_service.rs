use std::sync::Arc;
use super::error::ApplicationError;
use log::info;

use crate::domain::advice::NutritionAdvice;
use crate::domain::analysis::AnalysisReport;
use crate::domain::backend::{NutritionAdvisor, NutritionBackend};
use crate::domain::profile::UserProfile;

/// Builds the instruction text for the advice model.
pub fn compose_prompt(profile: &UserProfile, report: &AnalysisReport) -> String {
    let needs = if profile.special_needs.is_empty() {
        "none reported".to_string()
    } else {
        profile.special_needs.join(", ")
    };
    let nutrients = serde_json::to_string(&report.nutrients).unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are a nutrition assistant. Judge a scanned food label against this user's profile.\n\
         \n\
         User profile:\n\
         - Age: {age}\n\
         - Gender: {gender}\n\
         - Height: {height} cm\n\
         - Weight: {weight} kg\n\
         - Health conditions: {needs}\n\
         \n\
         Scanned label:\n\
         - Food safety rating: {rating}\n\
         - Nutrients: {nutrients}\n\
         \n\
         Use simple language, explain why the food suits the user or not, and avoid medical advice.\n\
         Respond only with JSON in this format:\n\
         {{\"Evaluation\": \"...\", \"Recommendations\": \"...\", \"Alternatives\": [\"...\"]}}",
        age = profile.age,
        gender = profile.gender,
        height = profile.height,
        weight = profile.weight,
        needs = needs,
        rating = report.final_rating(),
        nutrients = nutrients,
    )
}

pub struct AdviceService {
    advisor: Arc<dyn NutritionAdvisor>,
    backend: Arc<dyn NutritionBackend>,
}

impl AdviceService {
    pub fn new(advisor: Arc<dyn NutritionAdvisor>, backend: Arc<dyn NutritionBackend>) -> Self {
        Self { advisor, backend }
    }

    pub async fn advise(&self, user_id: &str, report: &AnalysisReport) -> Result<NutritionAdvice, ApplicationError> {
        let profile = self
            .backend
            .fetch_profile(user_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("No profile for user {}", user_id)))?;

        let prompt = compose_prompt(&profile, report);
        let advice = self.advisor.advise(&prompt).await?;
        info!("Advice generated for {} ({} alternatives)", user_id, advice.alternatives.len());
        Ok(advice)
    }
}
