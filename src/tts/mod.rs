//! Модуль для работы с TTS
//!
//! Провайдер синтеза скрыт за трейтом [`SpeechProvider`]; повторы, паузы между
//! вызовами и запись клипов выполняет [`synthesizer::SpeechSynthesizer`].

use async_trait::async_trait;
use bytes::Bytes;
use crate::config::TtsVoice;
use crate::error::Result;

pub mod openai;
pub mod synthesizer;

/// Внешний провайдер синтеза речи: один запрос, один аудиофайл
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Синтезировать речь и вернуть закодированное аудио
    async fn synthesize(&self, text: &str, voice: &TtsVoice) -> Result<Bytes>;
}
