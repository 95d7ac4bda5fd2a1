//! Разрешение конфликтов тайминга
//!
//! Для каждого клипа (в порядке `start`) вычисляется доступное время: речь
//! юнита должна закончиться до начала следующего юнита, а не до собственного
//! `end`. Если клип длиннее, он сжимается по времени, но не сильнее потолка
//! ускорения; сверх потолка клип наезжает на следующий юнит.
//!
//! Якорь клипа (`exact_start`) всегда равен исходному `start`, длительности
//! предыдущих клипов на него не влияют.

use crate::config::TimingConfig;
use crate::error::Result;
use crate::media::audio::AudioTool;
use crate::models::{AdjustedClip, SynthesizedClip};
use crate::utils::workspace::{remove_quietly, RunWorkspace};

/// Решение по одному клипу, принятое до сжатия
#[derive(Debug, Clone, PartialEq)]
pub struct TimingDecision {
    /// Доступное время, секунды
    pub available_time: f64,
    /// Требуемый коэффициент ускорения (до ограничения потолком)
    pub required_factor: f64,
    /// Коэффициент, который будет применен; `None`, если сжатие не нужно
    pub applied_factor: Option<f64>,
}

impl TimingDecision {
    /// Упирается ли клип в потолок ускорения
    pub fn is_capped(&self) -> bool {
        self.applied_factor
            .map(|factor| factor < self.required_factor)
            .unwrap_or(false)
    }
}

/// Сводка по результатам разрешения тайминга
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingReport {
    pub total: usize,
    pub adjusted: usize,
    pub capped: usize,
    /// Клипы, для которых сжатие не удалось и использован исходник
    pub fallbacks: usize,
    /// Сжатые клипы, которые после пробы не уложились в допуск
    pub drifted: usize,
    /// Суммарный наезд на следующие юниты, секунды
    pub total_overrun: f64,
}

/// Доступное время для клипа `index` в упорядоченном списке
fn available_time(clips: &[SynthesizedClip], index: usize, config: &TimingConfig) -> f64 {
    let unit = &clips[index].unit;
    let target_window = unit.window();

    match clips.get(index + 1) {
        None => target_window,
        Some(next) => target_window
            .min(next.unit.start - unit.start)
            .max(config.min_available_time),
    }
}

/// Принять решения по всем клипам без обращения к внешней утилите
pub fn plan_timing(clips: &[SynthesizedClip], config: &TimingConfig) -> Vec<TimingDecision> {
    (0..clips.len())
        .map(|index| {
            let available = available_time(clips, index, config);
            let measured = clips[index].measured_duration;

            if measured <= available {
                return TimingDecision {
                    available_time: available,
                    required_factor: 1.0,
                    applied_factor: None,
                };
            }

            let required = measured / available;
            let applied = if required <= config.max_speedup {
                required
            } else {
                config.max_speedup
            };

            TimingDecision {
                available_time: available,
                required_factor: required,
                applied_factor: Some(applied),
            }
        })
        .collect()
}

/// Разбить коэффициент на ступени, каждая не больше `max_stage`
///
/// Произведение ступеней равно `factor`.
pub fn split_into_stages(factor: f64, max_stage: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    let mut remaining = factor;

    while remaining > max_stage {
        stages.push(max_stage);
        remaining /= max_stage;
    }
    if remaining > 1.0 || stages.is_empty() {
        stages.push(remaining);
    }

    stages
}

/// Разрешить тайминг для всех клипов
///
/// Клипы сортируются по `start`. Ошибка сжатия или повторной пробы не фатальна:
/// для такого клипа используется исходник без ускорения.
pub async fn resolve_timing(
    mut clips: Vec<SynthesizedClip>,
    tool: &dyn AudioTool,
    workspace: &RunWorkspace,
    config: &TimingConfig,
) -> Result<(Vec<AdjustedClip>, TimingReport)> {
    clips.sort_by(|a, b| a.unit.start.total_cmp(&b.unit.start));

    let decisions = plan_timing(&clips, config);
    let mut adjusted = Vec::with_capacity(clips.len());
    let mut report = TimingReport {
        total: clips.len(),
        ..TimingReport::default()
    };

    for (clip, decision) in clips.iter().zip(&decisions) {
        let natural = AdjustedClip {
            unit: clip.unit.clone(),
            original_path: clip.path.clone(),
            effective_path: clip.path.clone(),
            effective_duration: clip.measured_duration,
            was_speed_adjusted: false,
            applied_factor: 1.0,
            available_time: decision.available_time,
            exact_start: clip.unit.start,
        };

        let Some(factor) = decision.applied_factor else {
            log::debug!(
                "Unit {} fits: {:.3}s of {:.3}s available",
                clip.position,
                clip.measured_duration,
                decision.available_time
            );
            adjusted.push(natural);
            continue;
        };

        if decision.is_capped() {
            log::warn!(
                "Unit {} needs x{:.2} speedup, capped at x{:.2}; speech will overrun",
                clip.position,
                decision.required_factor,
                factor
            );
            report.capped += 1;
        }

        let stages = split_into_stages(factor, config.max_stage_factor);
        let output = workspace.adjusted_path(clip.position);

        match compress(tool, clip, &stages, &output).await {
            Ok(effective_duration) => {
                log::debug!(
                    "Unit {} compressed x{:.3} in {} stage(s): {:.3}s -> {:.3}s (available {:.3}s)",
                    clip.position,
                    factor,
                    stages.len(),
                    clip.measured_duration,
                    effective_duration,
                    decision.available_time
                );
                report.adjusted += 1;
                if !decision.is_capped()
                    && effective_duration > decision.available_time + config.probe_tolerance
                {
                    log::warn!(
                        "Unit {} still {:.3}s over its window after compression",
                        clip.position,
                        effective_duration - decision.available_time
                    );
                    report.drifted += 1;
                }
                adjusted.push(AdjustedClip {
                    effective_path: output,
                    effective_duration,
                    was_speed_adjusted: true,
                    applied_factor: factor,
                    ..natural
                });
            }
            Err(e) => {
                log::warn!(
                    "Compression failed for unit {}, using natural speed: {}",
                    clip.position,
                    e
                );
                remove_quietly(&output);
                report.fallbacks += 1;
                adjusted.push(natural);
            }
        }
    }

    report.total_overrun = adjusted
        .windows(2)
        .map(|pair| (pair[0].playback_end() - pair[1].exact_start).max(0.0))
        .sum();

    log::info!(
        "Timing resolved: {} clips, {} adjusted, {} capped, {} fallbacks, {} drifted, {:.2}s total overrun",
        report.total,
        report.adjusted,
        report.capped,
        report.fallbacks,
        report.drifted,
        report.total_overrun
    );

    Ok((adjusted, report))
}

/// Сжать клип и измерить результат заново
async fn compress(
    tool: &dyn AudioTool,
    clip: &SynthesizedClip,
    stages: &[f64],
    output: &std::path::Path,
) -> Result<f64> {
    tool.change_tempo(&clip.path, stages, output).await?;
    tool.probe_duration(output).await
}
