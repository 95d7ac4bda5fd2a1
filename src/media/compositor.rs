//! Сведение клипов в итоговую дорожку
//!
//! Каждый клип задерживается до своего `exact_start` и подается отдельным
//! входом; все входы смешиваются с равным весом, результат обрезается по
//! длительности видео и нормализуется по громкости.

use std::path::PathBuf;
use crate::config::LoudnessConfig;
use crate::error::{DubSyncError, Result};
use crate::media::audio::{AudioTool, MixInput};
use crate::models::AdjustedClip;
use crate::utils::workspace::{remove_quietly, RunWorkspace};

/// Результат сведения; файл лежит в рабочем каталоге запуска
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeOutput {
    pub path: PathBuf,
    /// Измеренная длительность, не больше длительности видео
    pub duration: f64,
    pub normalized: bool,
    pub clips: usize,
}

/// Смещение клипа в миллисекундах
pub fn delay_ms(exact_start: f64) -> u64 {
    (exact_start.max(0.0) * 1000.0).round() as u64
}

/// Свести клипы в одну дорожку длиной `total_duration`
pub async fn composite(
    clips: Vec<AdjustedClip>,
    total_duration: f64,
    tool: &dyn AudioTool,
    workspace: &RunWorkspace,
    loudness: &LoudnessConfig,
) -> Result<CompositeOutput> {
    if clips.is_empty() {
        return Err(DubSyncError::NoUsableSegments {
            stage: "composite",
            input: 0,
        });
    }
    if total_duration.is_nan() || total_duration <= 0.0 {
        return Err(DubSyncError::CompositeFailure {
            stage: "mix",
            clips: clips.len(),
            reason: format!("invalid total duration {}", total_duration),
        });
    }

    let inputs: Vec<MixInput> = clips
        .iter()
        .map(|clip| MixInput {
            path: clip.effective_path.clone(),
            delay_ms: delay_ms(clip.exact_start),
        })
        .collect();

    let filter_script = workspace.scratch_path("mix_filter.txt");
    let mixed = workspace.unique_path("mixed", "mp3");
    log::info!(
        "Mixing {} clips into a {:.2}s track",
        inputs.len(),
        total_duration
    );

    let mix_result = tool.mix(&inputs, total_duration, &filter_script, &mixed).await;

    // Неускоренные клипы и скрипт фильтра больше не нужны при любом исходе
    remove_quietly(&filter_script);
    for clip in clips.iter().filter(|clip| !clip.was_speed_adjusted) {
        remove_quietly(&clip.original_path);
    }

    if let Err(e) = mix_result {
        log::error!("Mixing {} clips failed: {}", clips.len(), e);
        remove_quietly(&mixed);
        return Err(DubSyncError::CompositeFailure {
            stage: "mix",
            clips: clips.len(),
            reason: e.to_string(),
        });
    }

    // Исходник ускоренного клипа хранится до успешного сведения
    for clip in clips.iter().filter(|clip| clip.was_speed_adjusted) {
        remove_quietly(&clip.effective_path);
        remove_quietly(&clip.original_path);
    }

    let normalized_path = workspace.unique_path("normalized", "mp3");
    let (path, normalized) = match tool.normalize_loudness(&mixed, loudness, &normalized_path).await {
        Ok(()) => {
            remove_quietly(&mixed);
            (normalized_path, true)
        }
        Err(e) => {
            log::warn!("Loudness normalization failed, keeping the raw mix: {}", e);
            remove_quietly(&normalized_path);
            (mixed, false)
        }
    };

    let measured = tool
        .probe_duration(&path)
        .await
        .map_err(|e| DubSyncError::CompositeFailure {
            stage: "probe",
            clips: clips.len(),
            reason: e.to_string(),
        })?;

    let duration = measured.min(total_duration);
    log::info!(
        "Composite ready: {:.2}s, normalized: {}",
        duration,
        normalized
    );

    Ok(CompositeOutput {
        path,
        duration,
        normalized,
        clips: clips.len(),
    })
}
