//! Модуль обработки ошибок библиотеки dub-sync
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при сборке дубляжа.
//! Часть ошибок фатальна для всего запуска, часть только деградирует результат
//! (см. [`DubSyncError::is_fatal`]).

use thiserror::Error;

/// Ошибки библиотеки dub-sync
#[derive(Debug, Error)]
pub enum DubSyncError {
    /// Не удалось получить видео или субтитры
    #[error("Acquisition failed: {0}")]
    AcquisitionFailure(String),

    /// У источника нет субтитров, нужен другой путь транскрибации
    #[error("No captions available for {0}")]
    NoCaptionsAvailable(String),

    /// Перевод вернул заметно меньше юнитов, чем было отправлено
    #[error("Incomplete translation: mapped {mapped} of {expected} units")]
    IncompleteTranslation { mapped: usize, expected: usize },

    /// Синтез речи для юнита не удался даже после повтора
    #[error("Speech synthesis failed for unit {position}: {reason}")]
    SynthesisFailure { position: usize, reason: String },

    /// Не осталось ни одного пригодного сегмента
    #[error("No usable segments at stage '{stage}' ({input} units in, 0 clips out)")]
    NoUsableSegments { stage: &'static str, input: usize },

    /// Ошибка изменения темпа клипа
    #[error("Tempo compression failed: {0}")]
    CompressionFailure(String),

    /// Ошибка нормализации громкости
    #[error("Loudness normalization failed: {0}")]
    NormalizationFailure(String),

    /// Ошибка сведения дорожки
    #[error("Composite failed at stage '{stage}' with {clips} clips: {reason}")]
    CompositeFailure {
        stage: &'static str,
        clips: usize,
        reason: String,
    },

    /// Внешняя утилита (ffmpeg/ffprobe) завершилась с ошибкой
    #[error("Audio tool error: {0}")]
    AudioTool(String),

    /// Удаленный API вернул ошибку
    #[error("API error: {0}")]
    Api(String),

    /// Запуск был отменен
    #[error("Run cancelled")]
    Cancelled,

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Неверный формат
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl DubSyncError {
    /// Прерывает ли ошибка весь запуск
    ///
    /// Деградирующие ошибки (`IncompleteTranslation`, `SynthesisFailure`,
    /// `CompressionFailure`, `NormalizationFailure`) обрабатываются внутри
    /// конвейера и до вызывающей стороны не доходят.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::IncompleteTranslation { .. }
                | Self::SynthesisFailure { .. }
                | Self::CompressionFailure(_)
                | Self::NormalizationFailure(_)
        )
    }
}

/// Тип Result для библиотеки dub-sync
pub type Result<T> = std::result::Result<T, DubSyncError>;
