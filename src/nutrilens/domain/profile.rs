use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userId", alias = "clerkId")]
    pub user_id: String,
    pub age: u32,
    pub gender: String,
    #[serde(rename = "specialNeeds", default)]
    pub special_needs: Vec<String>,
    /// Kilograms.
    pub weight: f64,
    /// Centimetres.
    pub height: f64,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.user_id.trim().is_empty() || self.gender.trim().is_empty() {
            return Err(DomainError::InvalidInput("All fields are required".to_string()));
        }
        if self.age == 0 || !(self.weight > 0.0) || !(self.height > 0.0) {
            return Err(DomainError::InvalidInput(
                "age, weight and height must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
