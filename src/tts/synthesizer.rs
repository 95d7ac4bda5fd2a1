//! Синтез речи по юнитам
//!
//! Вызовы провайдера идут строго по одному с фиксированной паузой между ними.
//! Неудачный вызов повторяется ровно один раз после паузы; вторая неудача
//! выбрасывает юнит, но не прерывает запуск.

use lazy_static::lazy_static;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use crate::config::{SynthesisConfig, TtsVoice};
use crate::error::{DubSyncError, Result};
use crate::media::audio::AudioTool;
use crate::models::{SpeechUnit, SynthesizedClip};
use crate::progress::ProgressTracker;
use crate::subtitle::parser::CUE_TAG_REGEX;
use crate::tts::SpeechProvider;
use crate::utils::workspace::{remove_quietly, RunWorkspace};

lazy_static! {
    /// Аннотации неречевых звуков: [музыка], (смех), {шум}, ♪
    static ref ANNOTATION_REGEX: Regex =
        Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}|[♪♫]").expect("valid annotation regex");
}

/// Подготовка текста для TTS
///
/// Возвращает `None`, если после удаления аннотаций не осталось произносимого текста.
pub fn prepare_text_for_tts(text: &str) -> Option<String> {
    let text = CUE_TAG_REGEX.replace_all(text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");
    let text = ANNOTATION_REGEX.replace_all(&text, " ");

    let normalized = text.split_whitespace().collect::<Vec<&str>>().join(" ");
    if normalized.chars().any(char::is_alphanumeric) {
        Some(normalized)
    } else {
        None
    }
}

/// Сводка по синтезу
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisReport {
    pub requested: usize,
    pub synthesized: usize,
    /// Юниты, пустые после удаления аннотаций
    pub skipped: usize,
    /// Юниты, выброшенные после повтора
    pub dropped: usize,
    pub retries: usize,
}

/// Синтезатор речи для юнитов одного запуска
pub struct SpeechSynthesizer<'a> {
    provider: &'a dyn SpeechProvider,
    tool: &'a dyn AudioTool,
    voice: TtsVoice,
    config: SynthesisConfig,
}

impl<'a> SpeechSynthesizer<'a> {
    pub fn new(
        provider: &'a dyn SpeechProvider,
        tool: &'a dyn AudioTool,
        voice: TtsVoice,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            provider,
            tool,
            voice,
            config,
        }
    }

    /// Синтезировать все юниты по порядку
    ///
    /// Позиция юнита в `units` определяет имя файла клипа.
    pub async fn synthesize_all(
        &self,
        units: &[SpeechUnit],
        workspace: &RunWorkspace,
        tracker: Option<&ProgressTracker>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<SynthesizedClip>, SynthesisReport)> {
        let mut clips = Vec::with_capacity(units.len());
        let mut report = SynthesisReport {
            requested: units.len(),
            ..SynthesisReport::default()
        };
        let mut calls_made = false;

        for (position, unit) in units.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DubSyncError::Cancelled);
            }

            let Some(text) = prepare_text_for_tts(&unit.text) else {
                log::info!("Skipping unit {}: nothing to speak in '{}'", position, unit.text);
                report.skipped += 1;
                continue;
            };

            if calls_made {
                tokio::time::sleep(self.config.pacing_delay()).await;
            }
            calls_made = true;

            match self.synthesize_unit(unit, &text, position, workspace, &mut report).await {
                Ok(clip) => {
                    report.synthesized += 1;
                    clips.push(clip);
                }
                Err(e) => {
                    log::error!("{}", e);
                    report.dropped += 1;
                }
            }

            if let Some(t) = tracker {
                t.update_step_progress(
                    (position + 1) as f32 / units.len() as f32 * 100.0,
                    Some(format!("Синтез речи: {}/{} юнитов", position + 1, units.len())),
                );
            }
        }

        log::info!(
            "Synthesis finished: {} clips, {} skipped, {} dropped, {} retries",
            report.synthesized,
            report.skipped,
            report.dropped,
            report.retries
        );
        Ok((clips, report))
    }

    /// Синтезировать один юнит с единственным повтором
    async fn synthesize_unit(
        &self,
        unit: &SpeechUnit,
        text: &str,
        position: usize,
        workspace: &RunWorkspace,
        report: &mut SynthesisReport,
    ) -> Result<SynthesizedClip> {
        let path = workspace.clip_path(position);

        let first_error = match self.attempt(text, &path).await {
            Ok(duration) => return Ok(self.clip(unit, position, path, duration)),
            Err(e) => e,
        };

        log::warn!(
            "Synthesis failed for unit {} ({}), retrying in {:?}",
            position,
            first_error,
            self.config.retry_backoff()
        );
        report.retries += 1;
        tokio::time::sleep(self.config.retry_backoff()).await;

        match self.attempt(text, &path).await {
            Ok(duration) => Ok(self.clip(unit, position, path, duration)),
            Err(e) => {
                remove_quietly(&path);
                Err(DubSyncError::SynthesisFailure {
                    position,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Одна попытка: запрос, запись файла, проба длительности
    async fn attempt(&self, text: &str, path: &std::path::Path) -> Result<f64> {
        let audio = self.provider.synthesize(text, &self.voice).await?;
        if audio.is_empty() {
            return Err(DubSyncError::InvalidFormat("provider returned no audio".to_string()));
        }
        tokio::fs::write(path, &audio).await?;

        let duration = self.tool.probe_duration(path).await?;
        if duration <= 0.0 {
            return Err(DubSyncError::InvalidFormat(format!(
                "synthesized clip has zero duration: {}",
                path.display()
            )));
        }
        Ok(duration)
    }

    fn clip(&self, unit: &SpeechUnit, position: usize, path: std::path::PathBuf, duration: f64) -> SynthesizedClip {
        log::debug!(
            "Unit {} synthesized: {:.3}s for a {:.3}s window",
            position,
            duration,
            unit.window()
        );
        SynthesizedClip {
            unit: unit.clone(),
            position,
            path,
            measured_duration: duration,
        }
    }
}
