//! Модуль конфигурации библиотеки dub-sync
//!
//! Этот модуль содержит структуры и перечисления для настройки конвейера дубляжа.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{DubSyncError, Result};

/// Модель TTS для использования с OpenAI API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TtsModel {
    /// Стандартная модель
    #[default]
    Standard,
    /// Модель высокого качества
    HighDefinition,
}

impl TtsModel {
    /// Получить строковое представление модели
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "tts-1",
            Self::HighDefinition => "tts-1-hd",
        }
    }
}

/// Голос для использования с OpenAI API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TtsVoice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    #[default]
    Nova,
    Shimmer,
}

impl TtsVoice {
    /// Получить строковое представление голоса
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }

    /// Разобрать голос из строки (без учета регистра)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "echo" => Some(Self::Echo),
            "fable" => Some(Self::Fable),
            "onyx" => Some(Self::Onyx),
            "nova" => Some(Self::Nova),
            "shimmer" => Some(Self::Shimmer),
            _ => None,
        }
    }
}

/// Параметры склейки фрагментов субтитров
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Максимальный зазор между фрагментами для склейки, секунды
    pub gap_threshold: f64,
    /// Максимальная длина склеенного юнита, секунды
    pub max_unit_span: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 0.3,
            max_unit_span: 10.0,
        }
    }
}

/// Параметры вызовов синтеза речи
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Пауза перед единственным повтором, миллисекунды
    pub retry_backoff_ms: u64,
    /// Пауза между последовательными вызовами провайдера, миллисекунды
    pub pacing_delay_ms: u64,
}

impl SynthesisConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 2000,
            pacing_delay_ms: 300,
        }
    }
}

/// Параметры разрешения конфликтов тайминга
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Нижняя граница доступного времени, секунды
    pub min_available_time: f64,
    /// Потолок ускорения
    pub max_speedup: f64,
    /// Максимальный коэффициент одной ступени сжатия
    pub max_stage_factor: f64,
    /// Допуск при сравнении измеренных длительностей, секунды
    pub probe_tolerance: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_available_time: 0.5,
            max_speedup: 3.0,
            max_stage_factor: 2.0,
            probe_tolerance: 0.05,
        }
    }
}

/// Цель нормализации громкости (EBU R128)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    /// Интегральная громкость, LUFS
    pub integrated: f64,
    /// Потолок true peak, dBTP
    pub true_peak: f64,
    /// Диапазон громкости, LU
    pub loudness_range: f64,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            integrated: -16.0,
            true_peak: -1.5,
            loudness_range: 11.0,
        }
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DubSyncConfig {
    /// API ключ для OpenAI
    pub openai_api_key: String,
    /// Модель TTS
    pub tts_model: TtsModel,
    /// Голос TTS
    pub tts_voice: TtsVoice,
    /// Модель для перевода
    pub translation_model: String,
    /// Язык перевода (полное название, например "Russian")
    pub target_language: String,
    /// Количество юнитов в одном запросе перевода
    pub translation_batch_size: usize,
    /// Минимальная доля переведенных юнитов, ниже которой перевод считается неполным
    pub min_translation_coverage: f64,
    pub merge: MergeConfig,
    pub synthesis: SynthesisConfig,
    pub timing: TimingConfig,
    pub loudness: LoudnessConfig,
    /// Директория для готовых дорожек и их метаданных
    pub output_dir: PathBuf,
    /// Удалять временные файлы после завершения
    pub cleanup_temp_files: bool,
    /// Путь к ffmpeg
    pub ffmpeg_path: String,
    /// Путь к ffprobe
    pub ffprobe_path: String,
}

impl Default for DubSyncConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            tts_model: TtsModel::default(),
            tts_voice: TtsVoice::default(),
            translation_model: "gpt-4o-mini".to_string(),
            target_language: "Russian".to_string(),
            translation_batch_size: 50,
            min_translation_coverage: 0.9,
            merge: MergeConfig::default(),
            synthesis: SynthesisConfig::default(),
            timing: TimingConfig::default(),
            loudness: LoudnessConfig::default(),
            output_dir: PathBuf::from("dubs"),
            cleanup_temp_files: true,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl DubSyncConfig {
    /// Загрузить конфигурацию из JSON файла; отсутствующие поля берутся по умолчанию
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DubSyncError::Configuration(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Применить переменные окружения поверх конфигурации
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.openai_api_key = key;
            }
        }
        if let Ok(voice) = std::env::var("DUB_SYNC_VOICE") {
            match TtsVoice::parse(&voice) {
                Some(v) => self.tts_voice = v,
                None => log::warn!("Ignoring unknown DUB_SYNC_VOICE value: {}", voice),
            }
        }
        if let Ok(language) = std::env::var("DUB_SYNC_TARGET_LANGUAGE") {
            if !language.trim().is_empty() {
                self.target_language = language;
            }
        }
        self
    }

    /// Проверить согласованность параметров
    pub fn validate(&self) -> Result<()> {
        if self.merge.gap_threshold < 0.0 || self.merge.max_unit_span <= 0.0 {
            return Err(DubSyncError::Configuration(
                "merge thresholds must be positive".to_string(),
            ));
        }
        if self.timing.min_available_time <= 0.0 {
            return Err(DubSyncError::Configuration(
                "min_available_time must be positive".to_string(),
            ));
        }
        if self.timing.max_speedup < 1.0 {
            return Err(DubSyncError::Configuration(format!(
                "max_speedup must be >= 1.0, got {}",
                self.timing.max_speedup
            )));
        }
        if self.timing.max_stage_factor <= 1.0 || self.timing.max_stage_factor > 2.0 {
            return Err(DubSyncError::Configuration(format!(
                "max_stage_factor must be in (1.0, 2.0], got {}",
                self.timing.max_stage_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.min_translation_coverage) {
            return Err(DubSyncError::Configuration(
                "min_translation_coverage must be within [0, 1]".to_string(),
            ));
        }
        if self.translation_batch_size == 0 {
            return Err(DubSyncError::Configuration(
                "translation_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
