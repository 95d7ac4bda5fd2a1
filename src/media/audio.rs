//! Модуль для работы с аудио
//!
//! Трейт [`AudioTool`] описывает все, что конвейеру нужно от внешней утилиты
//! обработки звука: пробу длительности, сжатие по времени, сведение со
//! смещениями и нормализацию громкости. Рабочая реализация вызывает ffmpeg.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::Deserialize;
use crate::config::{DubSyncConfig, LoudnessConfig};
use crate::error::{DubSyncError, Result};
use crate::utils::ffmpeg::run_tool;

/// Частота дискретизации итоговой дорожки
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Вход сведения: клип и его смещение от начала дорожки
#[derive(Debug, Clone, PartialEq)]
pub struct MixInput {
    pub path: PathBuf,
    pub delay_ms: u64,
}

/// Внешняя утилита обработки аудио
#[async_trait]
pub trait AudioTool: Send + Sync {
    /// Измерить длительность файла, секунды
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Сжать клип цепочкой ступеней; произведение ступеней равно итоговому коэффициенту
    async fn change_tempo(&self, input: &Path, stages: &[f64], output: &Path) -> Result<()>;

    /// Свести клипы со смещениями в одну дорожку длиной ровно `total_duration`
    ///
    /// Описание графа фильтров записывается в `filter_script`.
    async fn mix(
        &self,
        inputs: &[MixInput],
        total_duration: f64,
        filter_script: &Path,
        output: &Path,
    ) -> Result<()>;

    /// Нормализовать громкость до заданной цели
    async fn normalize_loudness(
        &self,
        input: &Path,
        target: &LoudnessConfig,
        output: &Path,
    ) -> Result<()>;
}

/// Реализация [`AudioTool`] поверх ffmpeg/ffprobe
#[derive(Debug, Clone)]
pub struct FfmpegAudioTool {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegAudioTool {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &DubSyncConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
    }

    /// Проверить, что ffmpeg и ffprobe доступны
    pub async fn ensure_available(&self) -> Result<()> {
        for program in [&self.ffmpeg, &self.ffprobe] {
            if !crate::utils::ffmpeg::check_tool_installed(program).await {
                return Err(DubSyncError::Configuration(format!(
                    "{} is not installed or not on PATH",
                    program
                )));
            }
        }
        Ok(())
    }

    async fn measure_loudness(&self, input: &Path, target: &LoudnessConfig) -> Result<LoudnormMeasurement> {
        let args = vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-i".to_string(),
            path_arg(input),
            "-af".to_string(),
            format!("{}:print_format=json", loudnorm_filter(target)),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ];
        let output = run_tool(&self.ffmpeg, &args).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_loudnorm_measurement(&stderr)
    }
}

#[async_trait]
impl AudioTool for FfmpegAudioTool {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path_arg(path),
        ];
        let output = run_tool(&self.ffprobe, &args).await?;
        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn change_tempo(&self, input: &Path, stages: &[f64], output: &Path) -> Result<()> {
        if stages.is_empty() {
            return Err(DubSyncError::CompressionFailure(
                "empty tempo stage chain".to_string(),
            ));
        }
        let args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-i".to_string(),
            path_arg(input),
            "-filter:a".to_string(),
            atempo_chain(stages),
            "-ar".to_string(),
            OUTPUT_SAMPLE_RATE.to_string(),
            path_arg(output),
        ];
        run_tool(&self.ffmpeg, &args)
            .await
            .map_err(|e| DubSyncError::CompressionFailure(e.to_string()))?;
        Ok(())
    }

    async fn mix(
        &self,
        inputs: &[MixInput],
        total_duration: f64,
        filter_script: &Path,
        output: &Path,
    ) -> Result<()> {
        let graph = build_mix_filter(inputs, total_duration);
        tokio::fs::write(filter_script, &graph).await?;

        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];
        for input in inputs {
            args.push("-i".to_string());
            args.push(path_arg(&input.path));
        }
        args.extend([
            "-filter_complex_script".to_string(),
            path_arg(filter_script),
            "-map".to_string(),
            "[out]".to_string(),
            "-ar".to_string(),
            OUTPUT_SAMPLE_RATE.to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            path_arg(output),
        ]);

        run_tool(&self.ffmpeg, &args).await?;
        Ok(())
    }

    async fn normalize_loudness(
        &self,
        input: &Path,
        target: &LoudnessConfig,
        output: &Path,
    ) -> Result<()> {
        // Двухпроходная нормализация; при невозможности замера - однопроходная
        let filter = match self.measure_loudness(input, target).await {
            Ok(measured) if measured.is_usable() => measured.second_pass_filter(target),
            Ok(_) => {
                log::warn!("Loudness measurement unusable (silent input?), using single pass");
                loudnorm_filter(target)
            }
            Err(e) => {
                log::warn!("Loudness measurement failed, using single pass: {}", e);
                loudnorm_filter(target)
            }
        };

        let args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-i".to_string(),
            path_arg(input),
            "-af".to_string(),
            filter,
            "-ar".to_string(),
            OUTPUT_SAMPLE_RATE.to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            path_arg(output),
        ];
        run_tool(&self.ffmpeg, &args)
            .await
            .map_err(|e| DubSyncError::NormalizationFailure(e.to_string()))?;
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Разбор вывода ffprobe с длительностью
pub fn parse_duration(stdout: &str) -> Result<f64> {
    let trimmed = stdout.trim();
    let duration = trimmed.parse::<f64>().map_err(|_| {
        DubSyncError::AudioTool(format!("Failed to parse audio duration: '{}'", trimmed))
    })?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(DubSyncError::AudioTool(format!(
            "Invalid audio duration: {}",
            duration
        )));
    }
    Ok(duration)
}

/// Цепочка фильтров atempo
pub fn atempo_chain(stages: &[f64]) -> String {
    stages
        .iter()
        .map(|factor| format!("atempo={:.6}", factor))
        .collect::<Vec<String>>()
        .join(",")
}

/// Граф фильтров для сведения
///
/// Каждый вход сдвигается на свое смещение, все входы складываются с равным
/// весом без деления на количество (`normalize=0`), результат дополняется
/// тишиной и обрезается ровно до длительности видео.
pub fn build_mix_filter(inputs: &[MixInput], total_duration: f64) -> String {
    let mut filters = Vec::with_capacity(inputs.len() + 1);
    let duration = format!("{:.3}", total_duration.max(0.0));

    for (idx, input) in inputs.iter().enumerate() {
        filters.push(format!(
            "[{idx}:a]aresample={rate},adelay={delay}:all=1[d{idx}]",
            idx = idx,
            rate = OUTPUT_SAMPLE_RATE,
            delay = input.delay_ms,
        ));
    }

    let labels = (0..inputs.len())
        .map(|idx| format!("[d{}]", idx))
        .collect::<String>();
    let mixer = if inputs.len() == 1 {
        "anull".to_string()
    } else {
        format!(
            "amix=inputs={}:normalize=0:dropout_transition=0",
            inputs.len()
        )
    };

    filters.push(format!(
        "{labels}{mixer},apad=whole_dur={duration},atrim=end={duration}[out]",
        labels = labels,
        mixer = mixer,
        duration = duration,
    ));

    filters.join(";\n")
}

fn loudnorm_filter(target: &LoudnessConfig) -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        target.integrated, target.true_peak, target.loudness_range
    )
}

/// Результат первого прохода loudnorm (ffmpeg печатает значения строками)
#[derive(Debug, Deserialize)]
struct LoudnormMeasurement {
    input_i: String,
    input_tp: String,
    input_lra: String,
    input_thresh: String,
    target_offset: String,
}

impl LoudnormMeasurement {
    fn values(&self) -> Option<[f64; 5]> {
        let parse = |s: &str| s.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        Some([
            parse(&self.input_i)?,
            parse(&self.input_tp)?,
            parse(&self.input_lra)?,
            parse(&self.input_thresh)?,
            parse(&self.target_offset)?,
        ])
    }

    fn is_usable(&self) -> bool {
        self.values().is_some()
    }

    fn second_pass_filter(&self, target: &LoudnessConfig) -> String {
        match self.values() {
            Some([i, tp, lra, thresh, offset]) => format!(
                "{}:measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}:offset={}:linear=true",
                loudnorm_filter(target),
                i,
                tp,
                lra,
                thresh,
                offset
            ),
            None => loudnorm_filter(target),
        }
    }
}

/// Извлечь JSON замера из stderr ffmpeg
fn parse_loudnorm_measurement(stderr: &str) -> Result<LoudnormMeasurement> {
    let start = stderr.rfind('{');
    let end = stderr.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            Ok(serde_json::from_str(&stderr[start..=end])?)
        }
        _ => Err(DubSyncError::NormalizationFailure(
            "loudnorm measurement not found in ffmpeg output".to_string(),
        )),
    }
}
