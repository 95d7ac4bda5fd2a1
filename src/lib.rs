//! Основной файл библиотеки dub-sync
//!
//! Библиотека собирает дубляжную аудиодорожку для видео: субтитры склеиваются
//! в речевые юниты, переводятся, озвучиваются через TTS, каждый клип
//! укладывается в свое окно и все клипы сводятся в одну дорожку длиной ровно
//! с видео.

pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod progress;
pub mod source;
pub mod store;
pub mod subtitle;
pub mod translation;
pub mod tts;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

pub use crate::config::DubSyncConfig;
pub use crate::error::{DubSyncError, Result};
pub use crate::models::DubTrack;

use crate::media::audio::{AudioTool, FfmpegAudioTool};
use crate::progress::{DefaultProgressReporter, ProcessStep, ProgressObserver, ProgressReporter, ProgressTracker};
use crate::source::{LocalVideoSource, VideoSource};
use crate::store::{DubTrackRecord, DubTrackStore};
use crate::translation::openai::OpenAiTranslator;
use crate::translation::TranslationService;
use crate::tts::openai::OpenAiSpeechProvider;
use crate::tts::synthesizer::SpeechSynthesizer;
use crate::tts::SpeechProvider;
use crate::utils::workspace::RunWorkspace;

/// Основная структура для сборки дубляжа
pub struct DubSync {
    /// Конфигурация библиотеки
    config: DubSyncConfig,
    source: Arc<dyn VideoSource>,
    translator: Arc<dyn TranslationService>,
    provider: Arc<dyn SpeechProvider>,
    tool: Arc<dyn AudioTool>,
    store: DubTrackStore,
    /// Трекер прогресса
    progress_tracker: Option<ProgressTracker>,
}

impl DubSync {
    /// Создать экземпляр с рабочими реализациями (ffmpeg, OpenAI, локальные файлы)
    pub fn new(config: DubSyncConfig) -> Result<Self> {
        config.validate()?;
        let tool: Arc<dyn AudioTool> = Arc::new(FfmpegAudioTool::from_config(&config));
        let source = Arc::new(LocalVideoSource::new(tool.clone()));
        let translator = Arc::new(OpenAiTranslator::from_config(&config)?);
        let provider = Arc::new(OpenAiSpeechProvider::from_config(&config)?);

        Ok(Self::with_components(config, source, translator, provider, tool))
    }

    /// Создать экземпляр с заданными внешними компонентами
    pub fn with_components(
        config: DubSyncConfig,
        source: Arc<dyn VideoSource>,
        translator: Arc<dyn TranslationService>,
        provider: Arc<dyn SpeechProvider>,
        tool: Arc<dyn AudioTool>,
    ) -> Self {
        let store = DubTrackStore::new(config.output_dir.clone());
        Self {
            config,
            source,
            translator,
            provider,
            tool,
            store,
            progress_tracker: None,
        }
    }

    /// Создать экземпляр с рабочими реализациями и репортером прогресса
    pub fn with_progress_reporter(config: DubSyncConfig, reporter: Box<dyn ProgressReporter>) -> Result<Self> {
        let mut dub_sync = Self::new(config)?;
        dub_sync.set_progress_reporter(reporter);
        Ok(dub_sync)
    }

    /// Установить репортер прогресса
    pub fn set_progress_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        match &mut self.progress_tracker {
            Some(tracker) => tracker.set_reporter(reporter),
            None => self.progress_tracker = Some(ProgressTracker::with_reporter(reporter)),
        }
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.progress_tracker
            .get_or_insert_with(|| ProgressTracker::with_reporter(Box::new(DefaultProgressReporter::new())))
            .add_observer(observer)
            .unwrap_or(0)
    }

    pub fn config(&self) -> &DubSyncConfig {
        &self.config
    }

    pub fn store(&self) -> &DubTrackStore {
        &self.store
    }

    /// Собрать дубляжную дорожку для источника
    pub async fn process(&self, url: &str) -> Result<DubTrack> {
        self.process_with_cancel(url, CancellationToken::new()).await
    }

    /// Собрать дорожку с возможностью отмены
    ///
    /// При отмене незавершенный запуск сбрасывается вместе с рабочей
    /// директорией, в хранилище ничего не пишется.
    pub async fn process_with_cancel(&self, url: &str, cancel: CancellationToken) -> Result<DubTrack> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("Dub run for {} cancelled", url);
                Err(DubSyncError::Cancelled)
            }
            result = self.run(url, &cancel) => {
                if let Err(e) = &result {
                    log::error!("Dub run for {} failed: {}", url, e);
                }
                result
            }
        }
    }

    async fn run(&self, url: &str, cancel: &CancellationToken) -> Result<DubTrack> {
        log::info!("Starting dub track synthesis for {}", url);
        let tracker = self.progress_tracker.as_ref();
        let step = |step: ProcessStep, details: &str| {
            if let Some(t) = tracker {
                t.set_step(step);
                t.update_step_progress(0.0, Some(details.to_string()));
            }
        };
        let done = |details: &str| {
            if let Some(t) = tracker {
                t.update_step_progress(100.0, Some(details.to_string()));
            }
        };

        // 1. Получение видео и субтитров
        step(ProcessStep::CaptionFetch, "Получение видео и субтитров");
        let info = self.source.fetch(url).await?;
        let fragments = self.source.fetch_captions(url).await?;
        log::info!("Fetched {} caption fragments for '{}'", fragments.len(), info.title);
        done("Субтитры получены");

        // 2. Склейка фрагментов в юниты
        step(ProcessStep::SegmentMerge, "Склейка фрагментов");
        let units = subtitle::merger::merge_fragments(&fragments, &self.config.merge);
        if units.is_empty() {
            return Err(DubSyncError::NoUsableSegments {
                stage: "merge",
                input: fragments.len(),
            });
        }
        let metrics = subtitle::analyzer::analyze_unit_timing(&units);
        log::info!(
            "Merged {} fragments into {} units (avg {:.2}s, min {:.2}s, max {:.2}s, avg gap {:.2}s)",
            fragments.len(),
            units.len(),
            metrics.avg_duration,
            metrics.min_duration,
            metrics.max_duration,
            metrics.avg_gap
        );
        done("Склейка завершена");

        // 3. Перевод
        step(ProcessStep::Translation, "Перевод юнитов");
        let translations = self.translator.translate(&units).await?;
        let mapping = subtitle::mapper::map_translations(&units, &translations);
        match mapping.check_coverage(self.config.min_translation_coverage) {
            Err(e) if !e.is_fatal() => log::warn!("{}; continuing with translated units only", e),
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        let expected = mapping.expected;
        let units = mapping.units;
        if units.is_empty() {
            return Err(DubSyncError::NoUsableSegments {
                stage: "translation",
                input: expected,
            });
        }
        done("Перевод завершен");

        // 4. Синтез речи
        step(ProcessStep::SpeechSynthesis, "Синтез речи");
        let workspace = RunWorkspace::new(self.config.cleanup_temp_files)?;
        let synthesizer = SpeechSynthesizer::new(
            self.provider.as_ref(),
            self.tool.as_ref(),
            self.config.tts_voice.clone(),
            self.config.synthesis.clone(),
        );
        let (clips, _) = synthesizer
            .synthesize_all(&units, &workspace, tracker, cancel)
            .await?;
        if clips.is_empty() {
            return Err(DubSyncError::NoUsableSegments {
                stage: "synthesis",
                input: units.len(),
            });
        }

        // 5. Разрешение тайминга
        step(ProcessStep::TimingResolution, "Подгонка клипов по времени");
        let (adjusted, _) =
            media::timing::resolve_timing(clips, self.tool.as_ref(), &workspace, &self.config.timing).await?;
        done("Тайминг разрешен");

        // 6. Сведение и сохранение
        step(ProcessStep::Compositing, "Сведение дорожки");
        let output = media::compositor::composite(
            adjusted,
            info.total_duration,
            self.tool.as_ref(),
            &workspace,
            &self.config.loudness,
        )
        .await?;

        if cancel.is_cancelled() {
            return Err(DubSyncError::Cancelled);
        }

        let record = DubTrackRecord {
            source_id: DubTrackStore::source_id(url),
            source_url: url.to_string(),
            title: info.title,
            thumbnail: info.thumbnail,
            target_language: self.config.target_language.clone(),
            voice: self.config.tts_voice.as_str().to_string(),
            duration: output.duration,
            total_duration: info.total_duration,
            normalized: output.normalized,
            clips: output.clips,
            created_at: Utc::now(),
        };
        let track = self.store.save(&record, &output.path).await?;

        if let Some(t) = tracker {
            t.update_step_progress(100.0, Some("Дорожка сохранена".to_string()));
            t.complete();
        }
        log::info!("Dub track for {} ready at {}", url, track.path.display());
        Ok(track)
    }
}

/// Публичный API для удобного использования
pub async fn synthesize_dub_track(url: &str, openai_api_key: &str) -> Result<DubTrack> {
    let config = DubSyncConfig {
        openai_api_key: openai_api_key.to_string(),
        ..DubSyncConfig::default()
    };

    DubSync::new(config)?.process(url).await
}
