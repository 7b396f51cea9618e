//! Speech-to-text providers.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{SttConfig, SttProvider};
use crate::error::{ProviderError, ServiceResult};
use crate::i18n::is_english;

const PROVIDER: &str = "openai";

/// An uploaded audio clip
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Bytes,
    pub file_name: String,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transcribe a clip. Returns the raw transcript, possibly empty.
    async fn transcribe(&self, clip: AudioClip, locale: &str) -> ServiceResult<String>;
}

/// Language hint sent with the audio
pub fn language_hint(locale: &str) -> &'static str {
    if is_english(locale) { "en" } else { "pt" }
}

/// OpenAI-compatible `/v1/audio/transcriptions` client
pub struct OpenAiTranscriber {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiTranscriber {
    pub fn new(config: &SttConfig, api_key: &str) -> ServiceResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Connection {
                url: base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn transcribe(&self, clip: AudioClip, locale: &str) -> ServiceResult<String> {
        let url = format!("{}/v1/audio/transcriptions", self.base_url);

        let mut part = Part::bytes(clip.data.to_vec()).file_name(clip.file_name);
        if let Some(content_type) = clip.content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| ProviderError::Connection {
                    url: url.clone(),
                    source: e,
                })?;
        }

        let form = Form::new()
            .text("model", self.model.clone())
            .text("language", language_hint(locale))
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request { status, message }.into());
        }

        let body: TranscriptionResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER,
                    message: e.to_string(),
                })?;

        Ok(body.text.trim().to_string())
    }
}

/// Build the configured transcriber. `None` disables audio turns.
pub fn build_transcriber(config: &SttConfig) -> ServiceResult<Option<Arc<dyn Transcriber>>> {
    match (config.provider, config.api_key()) {
        (SttProvider::Disabled, _) => {
            info!("Speech-to-text disabled");
            Ok(None)
        }
        (SttProvider::Openai, Some(key)) => {
            info!(model = %config.model, "Using OpenAI speech-to-text");
            Ok(Some(Arc::new(OpenAiTranscriber::new(config, key)?)))
        }
        (SttProvider::Openai, None) => {
            warn!("stt.provider = openai but no api key is set, audio turns will ask to repeat");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: SttProvider, key: Option<&str>) -> SttConfig {
        let mut config: SttConfig = serde_json::from_str("{}").unwrap();
        config.provider = provider;
        config.api_key = key.map(str::to_string);
        config
    }

    #[test]
    fn test_language_hint() {
        assert_eq!(language_hint("pt-BR"), "pt");
        assert_eq!(language_hint("pt"), "pt");
        assert_eq!(language_hint("en-US"), "en");
        assert_eq!(language_hint(""), "pt");
    }

    #[test]
    fn test_build_transcriber() {
        assert!(build_transcriber(&config(SttProvider::Disabled, Some("k"))).unwrap().is_none());
        assert!(build_transcriber(&config(SttProvider::Openai, None)).unwrap().is_none());
        let transcriber = build_transcriber(&config(SttProvider::Openai, Some("k")))
            .unwrap()
            .unwrap();
        assert_eq!(transcriber.name(), "openai");
    }

    #[test]
    fn test_parse_response() {
        let body: TranscriptionResponse =
            serde_json::from_str(r#"{"text":" qual item compro? "}"#).unwrap();
        assert_eq!(body.text.trim(), "qual item compro?");
    }
}
