//! Модуль для парсинга субтитров
//!
//! Этот модуль превращает WebVTT файл в последовательность [`CaptionFragment`].

use std::path::Path;
use lazy_static::lazy_static;
use regex::Regex;
use crate::error::{DubSyncError, Result};
use crate::models::CaptionFragment;

lazy_static! {
    /// Inline-теги субтитров и разметки: `<c>`, `<i>`, `<00:00:01.000>`
    pub(crate) static ref CUE_TAG_REGEX: Regex = Regex::new(r"<[^>]*>").expect("valid tag regex");
}

/// Парсинг VTT файла
pub fn parse_vtt_file<P: AsRef<Path>>(vtt_file_path: P) -> Result<Vec<CaptionFragment>> {
    let content = std::fs::read_to_string(&vtt_file_path).map_err(|e| {
        DubSyncError::AcquisitionFailure(format!(
            "Failed to open VTT file {}: {}",
            vtt_file_path.as_ref().display(),
            e
        ))
    })?;

    parse_vtt_str(&content)
}

/// Парсинг содержимого VTT
pub fn parse_vtt_str(content: &str) -> Result<Vec<CaptionFragment>> {
    let mut lines = content.lines();

    // Проверяем заголовок WebVTT
    match lines.next() {
        Some(header) if header.trim_start_matches('\u{feff}').starts_with("WEBVTT") => {}
        _ => {
            return Err(DubSyncError::InvalidFormat(
                "Invalid VTT file format: missing WEBVTT header".to_string(),
            ))
        }
    }

    let mut fragments = Vec::new();
    let mut current_block: Vec<&str> = Vec::new();

    for line in lines {
        if line.trim().is_empty() {
            if let Some(fragment) = parse_cue_block(&current_block) {
                fragments.push(fragment);
            }
            current_block.clear();
        } else {
            current_block.push(line);
        }
    }

    // Обрабатываем последний блок, если он есть
    if let Some(fragment) = parse_cue_block(&current_block) {
        fragments.push(fragment);
    }

    // Источник обещает порядок по start, но VTT этого не гарантирует
    fragments.sort_by(|a, b| a.start.total_cmp(&b.start));

    log::debug!("Parsed {} caption fragments", fragments.len());
    Ok(fragments)
}

/// Парсинг блока субтитра
fn parse_cue_block(lines: &[&str]) -> Option<CaptionFragment> {
    let timing_index = lines.iter().position(|line| line.contains("-->"))?;
    let (start_part, end_part) = lines[timing_index].split_once("-->")?;

    let start = parse_time_str(start_part)?;
    // После времени окончания могут идти настройки cue ("align:start")
    let end = parse_time_str(end_part.split_whitespace().next()?)?;

    let text = lines[timing_index + 1..]
        .iter()
        .map(|line| strip_cue_tags(line.trim()))
        .filter(|line| !line.is_empty())
        .collect::<Vec<String>>()
        .join(" ");

    Some(CaptionFragment::new(start, end, text))
}

/// Удаление inline-тегов вида `<c>` и `<00:00:01.000>`
fn strip_cue_tags(line: &str) -> String {
    CUE_TAG_REGEX.replace_all(line, "").trim().to_string()
}

/// Парсинг строки времени в формате HH:MM:SS.mmm или MM:SS.mmm, в секундах
fn parse_time_str(time_str: &str) -> Option<f64> {
    let normalized = time_str.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, *s),
        [m, s] => (0, m.parse::<u64>().ok()?, *s),
        _ => return None,
    };

    let seconds = seconds.parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    Some((hours * 3600 + minutes * 60) as f64 + seconds)
}
