//! Перевод через OpenAI Chat Completions
//!
//! Юниты отправляются пачками в виде нумерованных строк `N. текст`, ответ
//! разбирается обратно по номерам. Номера в запросе сквозные, поэтому индекс в
//! ответе - это позиция юнита во всем списке.

use std::time::Duration;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::config::DubSyncConfig;
use crate::error::{DubSyncError, Result};
use crate::models::{IndexedTranslation, SpeechUnit};
use crate::translation::TranslationService;

const CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Пауза между пачками, чтобы не упираться в лимиты API
const BATCH_DELAY: Duration = Duration::from_millis(300);

lazy_static! {
    static ref NUMBERED_LINE_REGEX: Regex =
        Regex::new(r"^\s*(\d+)\s*[.)]\s*(.*)$").expect("valid numbered line regex");
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Переводчик на основе OpenAI
pub struct OpenAiTranslator {
    client: Client,
    api_key: String,
    model: String,
    target_language: String,
    batch_size: usize,
    endpoint: String,
}

impl OpenAiTranslator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        target_language: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DubSyncError::Configuration(
                "OpenAI API key is required for translation".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            target_language: target_language.into(),
            batch_size: batch_size.max(1),
            endpoint: CHAT_ENDPOINT.to_string(),
        })
    }

    pub fn from_config(config: &DubSyncConfig) -> Result<Self> {
        Self::new(
            config.openai_api_key.clone(),
            config.translation_model.clone(),
            config.target_language.clone(),
            config.translation_batch_size,
        )
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a professional translator for video dubbing. \
            Translate each numbered line into {}. \
            Keep the numbering exactly as given, one numbered line per input line. \
            Keep translations natural and about as long as the original when spoken. \
            ONLY include the numbered translated lines in your response.",
            self.target_language
        )
    }

    /// Перевести одну пачку; `offset` - позиция первого юнита пачки
    async fn translate_batch(&self, batch: &[SpeechUnit], offset: usize) -> Result<Vec<IndexedTranslation>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: self.system_prompt(),
                },
                Message {
                    role: "user".to_string(),
                    content: numbered_lines(batch, offset),
                },
            ],
            temperature: 0.3,
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
                "OpenAI chat API error (status {}): {}",
                status, error_text
            )));
        }

        let completion: ChatCompletion = response.json().await?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| DubSyncError::InvalidFormat("chat completion has no choices".to_string()))?;

        Ok(parse_numbered_reply(&reply))
    }
}

/// Нумерованные строки запроса, нумерация с единицы
pub fn numbered_lines(units: &[SpeechUnit], offset: usize) -> String {
    units
        .iter()
        .enumerate()
        .map(|(i, unit)| format!("{}. {}", offset + i + 1, unit.text))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Разобрать ответ с нумерованными строками
///
/// Строка без номера продолжает предыдущую. Номер 0 не соответствует ни одному
/// юниту и отбрасывается.
pub fn parse_numbered_reply(reply: &str) -> Vec<IndexedTranslation> {
    let mut parsed: Vec<(usize, String)> = Vec::new();

    for line in reply.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = NUMBERED_LINE_REGEX.captures(line) {
            if let Ok(number) = caps[1].parse::<usize>() {
                parsed.push((number, caps[2].trim().to_string()));
                continue;
            }
        }

        if let Some((_, text)) = parsed.last_mut() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(line);
        }
    }

    parsed
        .into_iter()
        .filter(|(number, _)| *number > 0)
        .map(|(number, text)| IndexedTranslation::new(number - 1, text))
        .collect()
}

#[async_trait]
impl TranslationService for OpenAiTranslator {
    async fn translate(&self, units: &[SpeechUnit]) -> Result<Vec<IndexedTranslation>> {
        let batch_count = units.len().div_ceil(self.batch_size);
        log::info!(
            "Translating {} units into {} in {} batches",
            units.len(),
            self.target_language,
            batch_count
        );

        let mut translations = Vec::with_capacity(units.len());
        let mut last_error = None;
        let mut succeeded = 0;

        for (batch_index, batch) in units.chunks(self.batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }

            let offset = batch_index * self.batch_size;
            log::debug!("Translating batch {}/{}", batch_index + 1, batch_count);
            match self.translate_batch(batch, offset).await {
                Ok(batch_translations) => {
                    if batch_translations.len() != batch.len() {
                        log::warn!(
                            "Batch {} returned {} lines for {} units",
                            batch_index + 1,
                            batch_translations.len(),
                            batch.len()
                        );
                    }
                    succeeded += 1;
                    translations.extend(batch_translations);
                }
                Err(e) => {
                    // Потерянная пачка обнаружится при сопоставлении
                    log::error!("Translation batch {} failed: {}", batch_index + 1, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(translations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_lines_use_global_positions() {
        let units = vec![SpeechUnit::new(0.0, 1.0, "Hello"), SpeechUnit::new(1.0, 2.0, "World")];
        assert_eq!(numbered_lines(&units, 50), "51. Hello\n52. World");
    }

    #[test]
    fn test_parse_reply_with_duplicates_and_gaps() {
        let reply = "1. Привет\n3) Мир\n3. Снова мир\n\n";
        let parsed = parse_numbered_reply(reply);
        assert_eq!(
            parsed,
            vec![
                IndexedTranslation::new(0, "Привет"),
                IndexedTranslation::new(2, "Мир"),
                IndexedTranslation::new(2, "Снова мир"),
            ]
        );
    }

    #[test]
    fn test_parse_reply_joins_continuation_lines() {
        let reply = "Here you go:\n1. Первая строка\nпродолжение\n0. лишнее\n2. Вторая";
        let parsed = parse_numbered_reply(reply);
        assert_eq!(
            parsed,
            vec![
                IndexedTranslation::new(0, "Первая строка продолжение"),
                IndexedTranslation::new(1, "Вторая"),
            ]
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            OpenAiTranslator::new("", "gpt-4o-mini", "Russian", 50),
            Err(DubSyncError::Configuration(_))
        ));
    }
}
