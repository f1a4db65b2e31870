use crate::types::{DigestError, Result};
use std::env;

/// Runtime settings for the production pipeline, read once at startup and
/// passed explicitly into constructors. No component reads the environment
/// on its own.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: String,
    pub model: Option<String>,
    pub request_timeout_seconds: u64,
    pub profile_path: Option<String>,
}

impl Settings {
    /// Fail-fast load from the environment. `GEMINI_API_KEY` is required;
    /// everything else has a default.
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| DigestError::MissingConfig("GEMINI_API_KEY".to_string()))?;

        let request_timeout_seconds = env::var("MODEL_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            gemini_api_key,
            model: env::var("GEMINI_MODEL").ok(),
            request_timeout_seconds,
            profile_path: env::var("PROFILE_PATH").ok(),
        })
    }
}
