//! Источник видео и субтитров
//!
//! Конвейер получает сведения о видео и фрагменты субтитров через трейт
//! [`VideoSource`]. Если у видео нет субтитров, источник возвращает
//! `NoCaptionsAvailable`, и вызывающая сторона переключается на распознавание
//! речи (вне этой библиотеки).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use crate::error::{DubSyncError, Result};
use crate::media::audio::AudioTool;
use crate::models::{CaptionFragment, VideoInfo};
use crate::subtitle::parser::parse_vtt_file;

/// Источник видео и субтитров
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Получить сведения о видео
    async fn fetch(&self, url: &str) -> Result<VideoInfo>;

    /// Получить фрагменты субтитров, упорядоченные по времени начала
    async fn fetch_captions(&self, url: &str) -> Result<Vec<CaptionFragment>>;
}

const THUMBNAIL_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Источник для локальных файлов
///
/// "URL" здесь - путь к медиафайлу. Длительность берется пробой файла,
/// субтитры - из VTT рядом с ним (`video.vtt` или `video.<lang>.vtt`),
/// обложка - из изображения с тем же именем.
pub struct LocalVideoSource {
    tool: Arc<dyn AudioTool>,
}

impl LocalVideoSource {
    pub fn new(tool: Arc<dyn AudioTool>) -> Self {
        Self { tool }
    }

    fn media_path(url: &str) -> Result<PathBuf> {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        if !path.is_file() {
            return Err(DubSyncError::AcquisitionFailure(format!(
                "Media file not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Найти файлы рядом с медиафайлом с тем же именем и одним из расширений
    fn sibling_files(media: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        let (Some(dir), Some(stem)) = (media.parent(), media.file_stem()) else {
            return Vec::new();
        };
        let stem = stem.to_string_lossy().to_string();
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };

        let mut found: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file())
            .filter(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let matches_ext = path
                    .extension()
                    .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
                    .unwrap_or(false);
                matches_ext && (name.starts_with(&format!("{}.", stem)))
            })
            .collect();

        // Точное совпадение имени (video.vtt) раньше вариантов с языком
        found.sort_by_key(|path| path.file_name().map(|n| n.len()).unwrap_or(usize::MAX));
        found
    }
}

#[async_trait]
impl VideoSource for LocalVideoSource {
    async fn fetch(&self, url: &str) -> Result<VideoInfo> {
        let path = Self::media_path(url)?;
        let total_duration = self
            .tool
            .probe_duration(&path)
            .await
            .map_err(|e| DubSyncError::AcquisitionFailure(format!("Failed to probe {}: {}", path.display(), e)))?;

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| url.to_string());
        let thumbnail = Self::sibling_files(&path, &THUMBNAIL_EXTENSIONS)
            .into_iter()
            .next()
            .map(|p| p.to_string_lossy().to_string());

        log::info!("Fetched '{}' ({:.2}s)", title, total_duration);
        Ok(VideoInfo {
            total_duration,
            title,
            thumbnail,
        })
    }

    async fn fetch_captions(&self, url: &str) -> Result<Vec<CaptionFragment>> {
        let path = Self::media_path(url)?;
        let Some(vtt) = Self::sibling_files(&path, &["vtt"]).into_iter().next() else {
            return Err(DubSyncError::NoCaptionsAvailable(url.to_string()));
        };

        log::info!("Reading captions from {}", vtt.display());
        let fragments = parse_vtt_file(&vtt).map_err(|e| match e {
            DubSyncError::AcquisitionFailure(_) => e,
            other => DubSyncError::AcquisitionFailure(format!(
                "Failed to parse {}: {}",
                vtt.display(),
                other
            )),
        })?;

        if fragments.is_empty() {
            return Err(DubSyncError::NoCaptionsAvailable(url.to_string()));
        }
        Ok(fragments)
    }
}
