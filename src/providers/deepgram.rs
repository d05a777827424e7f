use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use super::Transcriber;
use crate::error::ProviderError;
use crate::models::{DeepgramResponse, TranscriptArtifact};

const LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

/// Configuration for the Deepgram transcription client
#[derive(Debug, Clone)]
pub struct DeepgramConfig {
    /// API key (from DEEPGRAM_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "nova-2")
    pub model: String,
    pub smart_format: bool,
}

impl DeepgramConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("DEEPGRAM_API_KEY")
            .context("DEEPGRAM_API_KEY environment variable not set")?;

        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "nova-2".to_string(),
            smart_format: true,
        }
    }
}

/// Transcribes hosted audio through Deepgram's pre-recorded API
pub struct DeepgramTranscriber {
    client: Client,
    config: DeepgramConfig,
}

#[derive(Debug, Serialize)]
struct ListenRequest<'a> {
    url: &'a str,
}

impl DeepgramTranscriber {
    pub fn new(config: DeepgramConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Send the audio URL to Deepgram and parse the full response
    pub async fn listen(&self, audio_url: &str, language_hint: Option<&str>) -> Result<DeepgramResponse> {
        let mut query = vec![
            ("model", self.config.model.clone()),
            ("smart_format", self.config.smart_format.to_string()),
        ];
        match language_hint {
            Some(language) => query.push(("language", language.to_string())),
            None => query.push(("detect_language", "true".to_string())),
        }

        let response = self
            .client
            .post(LISTEN_URL)
            .query(&query)
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&ListenRequest { url: audio_url })
            .send()
            .await
            .context("Failed to send request to Deepgram API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Deepgram", status, &body).into());
        }

        response
            .json()
            .await
            .context("Failed to parse Deepgram API response")
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(
        &self,
        audio_url: &str,
        language_hint: Option<&str>,
    ) -> Result<TranscriptArtifact, ProviderError> {
        let response = self
            .listen(audio_url, language_hint)
            .await
            .map_err(provider_error)?;

        let artifact = response.to_artifact();
        if artifact.text.is_empty() {
            return Err(ProviderError::Rejected(format!(
                "no speech recognized in {}",
                audio_url
            )));
        }
        Ok(artifact)
    }
}

/// Rate limits and server errors are worth retrying; other 4xx are final
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let message = format!("{} API error: {} - {}", provider, status, body);
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ProviderError::Transient(message)
    } else {
        ProviderError::Rejected(message)
    }
}

/// Recover a classified error from an anyhow chain; anything else is transient
pub(crate) fn provider_error(err: anyhow::Error) -> ProviderError {
    match err.downcast::<ProviderError>() {
        Ok(classified) => classified,
        Err(other) => ProviderError::Transient(format!("{:#}", other)),
    }
}
