//! Перевод текста юнитов
//!
//! Сервис перевода получает упорядоченный список юнитов и возвращает ответы с
//! позиционными индексами. Ответ может терять или дублировать индексы, поэтому
//! сопоставление с юнитами выполняет [`crate::subtitle::mapper`].

use async_trait::async_trait;
use crate::error::Result;
use crate::models::{IndexedTranslation, SpeechUnit};

pub mod openai;

/// Сервис перевода
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Перевести юниты; `index` в ответе - позиция юнита во входном списке
    async fn translate(&self, units: &[SpeechUnit]) -> Result<Vec<IndexedTranslation>>;
}

/// Переводчик без перевода: переозвучка на языке оригинала
#[derive(Debug, Clone, Default)]
pub struct IdentityTranslator;

#[async_trait]
impl TranslationService for IdentityTranslator {
    async fn translate(&self, units: &[SpeechUnit]) -> Result<Vec<IndexedTranslation>> {
        Ok(units
            .iter()
            .enumerate()
            .map(|(index, unit)| IndexedTranslation::new(index, unit.text.clone()))
            .collect())
    }
}
