//! Общие типы данных конвейера дубляжа

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// Фрагмент субтитров в том виде, в каком его отдает источник
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionFragment {
    /// Время начала, секунды
    pub start: f64,
    /// Время окончания, секунды
    pub end: f64,
    /// Текст фрагмента
    pub text: String,
}

impl CaptionFragment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Юнит речи: склеенный (и, возможно, переведенный) отрезок текста
///
/// `start` и `end` всегда берутся из исходной временной шкалы и никогда не
/// пересчитываются по длительности синтезированного аудио.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechUnit {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SpeechUnit {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Целевое окно юнита, секунды
    pub fn window(&self) -> f64 {
        self.end - self.start
    }
}

/// Перевод одного юнита, адресованный по индексу
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedTranslation {
    pub index: usize,
    pub text: String,
}

impl IndexedTranslation {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Сведения о видео, полученные от источника
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Полная длительность видео, секунды
    pub total_duration: f64,
    pub title: String,
    pub thumbnail: Option<String>,
}

/// Синтезированный клип юнита
#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    pub unit: SpeechUnit,
    /// Позиция юнита в упорядоченном списке, из нее выводится имя файла
    pub position: usize,
    pub path: PathBuf,
    /// Длительность, измеренная пробой файла
    pub measured_duration: f64,
}

/// Клип после разрешения тайминга
#[derive(Debug, Clone)]
pub struct AdjustedClip {
    pub unit: SpeechUnit,
    /// Путь к исходному синтезированному клипу
    pub original_path: PathBuf,
    /// Путь к клипу, который пойдет в сведение
    pub effective_path: PathBuf,
    /// Измеренная длительность итогового клипа
    pub effective_duration: f64,
    pub was_speed_adjusted: bool,
    /// Примененный коэффициент ускорения (1.0 без изменений)
    pub applied_factor: f64,
    /// Доступное время, рассчитанное для юнита
    pub available_time: f64,
    /// Якорь: исходное начало юнита
    pub exact_start: f64,
}

impl AdjustedClip {
    /// Конец звучания клипа на общей шкале
    pub fn playback_end(&self) -> f64 {
        self.exact_start + self.effective_duration
    }
}

/// Итоговая дубляжная дорожка
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DubTrack {
    pub source_id: String,
    pub path: PathBuf,
    /// Измеренная длительность, не больше длительности видео
    pub duration: f64,
    /// Прошла ли дорожка нормализацию громкости
    pub normalized: bool,
}
