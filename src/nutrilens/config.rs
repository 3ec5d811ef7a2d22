use crate::application::error::ApplicationError;
use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

/// Settings resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub api_url: String,
    pub upload_timeout: Duration,
    pub static_dir: Option<PathBuf>,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ApplicationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApplicationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout_secs: u64 = try_load(&var, "NUTRILENS_UPLOAD_TIMEOUT_SECS", "30")?;
        if timeout_secs == 0 {
            return Err(ApplicationError::ConfigurationError(
                "NUTRILENS_UPLOAD_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let api_url: String = try_load(&var, "NUTRILENS_API_URL", "http://localhost:5001")?;

        Ok(Self {
            port: try_load(&var, "NUTRILENS_PORT", "3300")?,
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_timeout: Duration::from_secs(timeout_secs),
            static_dir: var("NUTRILENS_STATIC_DIR").map(PathBuf::from),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_api_url: try_load(&var, "GEMINI_API_URL", DEFAULT_GEMINI_API_URL)?,
        })
    }
}

fn try_load<T, F>(var: &F, key: &str, default: &str) -> Result<T, ApplicationError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    });
    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {} value '{}': {}", key, raw, e);
        ApplicationError::ConfigurationError(format!("invalid {} '{}': {}", key, raw, e))
    })
}
