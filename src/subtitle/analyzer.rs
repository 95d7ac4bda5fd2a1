//! Модуль для анализа временных меток юнитов
//!
//! Метрики пишутся в лог после склейки и помогают понять, насколько плотно
//! расположены реплики в конкретном видео.

use crate::models::SpeechUnit;

/// Метрики временных меток
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingMetrics {
    /// Средняя длительность юнита
    pub avg_duration: f64,
    /// Минимальная длительность юнита
    pub min_duration: f64,
    /// Максимальная длительность юнита
    pub max_duration: f64,
    /// Средний интервал между юнитами (только положительные)
    pub avg_gap: f64,
}

/// Анализ временных меток юнитов
pub fn analyze_unit_timing(units: &[SpeechUnit]) -> TimingMetrics {
    if units.is_empty() {
        return TimingMetrics::default();
    }

    let mut total_duration = 0.0;
    let mut min_duration = f64::MAX;
    let mut max_duration: f64 = 0.0;

    for unit in units {
        let duration = unit.window();
        total_duration += duration;
        min_duration = min_duration.min(duration);
        max_duration = max_duration.max(duration);
    }

    let gaps: Vec<f64> = units
        .windows(2)
        .map(|pair| pair[1].start - pair[0].end)
        .filter(|gap| *gap > 0.0)
        .collect();
    let avg_gap = if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().sum::<f64>() / gaps.len() as f64
    };

    TimingMetrics {
        avg_duration: total_duration / units.len() as f64,
        min_duration,
        max_duration,
        avg_gap,
    }
}
