use super::error::InfrastructureError;
use super::http_support::{read_json, send};
use crate::domain::advice::NutritionAdvice;
use crate::domain::backend::{BackendFuture, NutritionAdvisor};
use crate::domain::error::BackendError;
use futures::FutureExt;
use log::{debug, info};
use reqwest::Client;
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;

/// Text-generation client for the dietary advice assistant.
pub struct GeminiAdvisor {
    client: Client,
    endpoint: Url,
}

impl GeminiAdvisor {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, InfrastructureError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, api_url, api_key)
    }

    pub fn with_client(client: Client, api_url: &str, api_key: &str) -> Result<Self, InfrastructureError> {
        if api_key.trim().is_empty() {
            return Err(InfrastructureError::DecodingError("API key is required".to_string()));
        }
        let mut endpoint = Url::parse(api_url)
            .map_err(|e| InfrastructureError::DecodingError(format!("invalid advice API URL: {}", e)))?;
        endpoint.query_pairs_mut().append_pair("key", api_key.trim());
        Ok(Self { client, endpoint })
    }
}

// モデルが ```json ... ``` で囲んで返すことがある
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            body.trim_end().strip_suffix("```").unwrap_or(body).trim()
        }
        None => text,
    }
}

pub(crate) fn parse_advice(value: &Value) -> Result<NutritionAdvice, BackendError> {
    let text = value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::MalformedResponse("Unexpected response structure from API.".to_string()))?;
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| BackendError::MalformedResponse(format!("advice is not the expected JSON: {}", e)))
}

impl NutritionAdvisor for GeminiAdvisor {
    fn advise(&self, prompt: &str) -> BackendFuture<NutritionAdvice> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        info!(
            "Requesting advice from {} ({} prompt chars)",
            self.endpoint.host_str().unwrap_or("advice API"),
            prompt.len()
        );
        let request = self.client.post(self.endpoint.clone()).json(&body);
        async move {
            let value = read_json(send(request).await?).await?;
            debug!("Advice response: {}", value);
            parse_advice(&value)
        }
        .boxed()
    }
}
