//! Модуль для интеграции с OpenAI API
//!
//! Этот модуль содержит провайдер синтеза речи через `/v1/audio/speech`.

use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use crate::config::{DubSyncConfig, TtsModel, TtsVoice};
use crate::error::{DubSyncError, Result};
use crate::tts::SpeechProvider;

const SPEECH_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// Провайдер синтеза речи OpenAI
pub struct OpenAiSpeechProvider {
    client: Client,
    api_key: String,
    model: TtsModel,
    endpoint: String,
}

impl OpenAiSpeechProvider {
    /// Создать провайдер; пустой ключ API является ошибкой конфигурации
    pub fn new(api_key: impl Into<String>, model: TtsModel) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            log::error!("OpenAI API key is empty");
            return Err(DubSyncError::Configuration(
                "OpenAI API key is required for TTS generation".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint: SPEECH_ENDPOINT.to_string(),
        })
    }

    pub fn from_config(config: &DubSyncConfig) -> Result<Self> {
        Self::new(config.openai_api_key.clone(), config.tts_model.clone())
    }

    /// Переопределить адрес API (прокси, совместимые сервисы)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeechProvider {
    async fn synthesize(&self, text: &str, voice: &TtsVoice) -> Result<Bytes> {
        let request = SpeechRequest {
            model: self.model.as_str(),
            input: text,
            voice: voice.as_str(),
            response_format: "mp3",
            speed: 1.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return Err(DubSyncError::Api(format!(
                "OpenAI TTS API error (status {}): {}",
                status, error_text
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(DubSyncError::InvalidFormat(
                "OpenAI TTS API returned an empty body".to_string(),
            ));
        }

        log::debug!("Received {} bytes of speech for {} chars", bytes.len(), text.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            OpenAiSpeechProvider::new("  ", TtsModel::Standard),
            Err(DubSyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let request = SpeechRequest {
            model: TtsModel::HighDefinition.as_str(),
            input: "Привет",
            voice: TtsVoice::Onyx.as_str(),
            response_format: "mp3",
            speed: 1.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "tts-1-hd");
        assert_eq!(json["voice"], "onyx");
        assert_eq!(json["input"], "Привет");
    }
}
