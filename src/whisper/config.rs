use anyhow::{Context, Result};
use secrecy::SecretString;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "whisper-1";

#[derive(Clone, Debug)]
pub struct WhisperApiConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
}

impl WhisperApiConfig {
    pub fn new(api_key: SecretString, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` and `OPENAI_TRANSCRIBE_MODEL`,
    /// loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .context("OPENAI_API_KEY is not set")?;

        let mut config = Self::new(SecretString::from(api_key), optional_env("OPENAI_BASE_URL"));
        if let Some(model) = optional_env("OPENAI_TRANSCRIBE_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    pub fn transcriptions_url(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
