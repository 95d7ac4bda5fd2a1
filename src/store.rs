//! Хранилище готовых дубляжных дорожек
//!
//! Каждая дорожка хранится как `<source_id>.mp3` и рядом `<source_id>.json` с
//! метаданными. `source_id` - md5 от URL источника. Запись идет через
//! временный файл с последующим переименованием, так что недописанная дорожка
//! под итоговым именем не появляется.

use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{DubSyncError, Result};
use crate::models::DubTrack;

/// Метаданные сохраненной дорожки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DubTrackRecord {
    pub source_id: String,
    pub source_url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub target_language: String,
    pub voice: String,
    /// Длительность дорожки, секунды
    pub duration: f64,
    /// Длительность исходного видео, секунды
    pub total_duration: f64,
    pub normalized: bool,
    /// Число клипов в сведении
    pub clips: usize,
    pub created_at: DateTime<Utc>,
}

/// Хранилище дорожек в одной директории
#[derive(Debug, Clone)]
pub struct DubTrackStore {
    root: PathBuf,
}

impl DubTrackStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Идентификатор источника: md5 от URL в hex
    pub fn source_id(url: &str) -> String {
        format!("{:x}", md5::compute(url.as_bytes()))
    }

    /// Путь к файлу дорожки
    pub fn track_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.mp3", id))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    fn temp_path(&self, id: &str, extension: &str) -> PathBuf {
        self.root
            .join(format!(".{}.{}.{}.tmp", id, uuid::Uuid::new_v4(), extension))
    }

    /// Удалить временные файлы прерванных сохранений дорожки `id`
    fn remove_stale_temp_files(&self, id: &str) -> Result<usize> {
        let prefix = format!(".{}.", id);
        let mut removed = 0;
        for entry in walkdir::WalkDir::new(&self.root).max_depth(1) {
            let entry = entry.map_err(|e| DubSyncError::Other(format!("Failed to scan store: {}", e)))?;
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_file() && name.starts_with(&prefix) && name.ends_with(".tmp") {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("Failed to remove stale {}: {}", entry.path().display(), e),
                }
            }
        }
        if removed > 0 {
            log::info!("Removed {} stale temp files of dub track {}", removed, id);
        }
        Ok(removed)
    }

    /// Сохранить дорожку и ее метаданные
    ///
    /// `mixed_path` обычно лежит во временной директории запуска, поэтому файл
    /// копируется, а не переносится. Оба файла сначала пишутся во временные,
    /// затем переименовываются одной блокирующей задачей: прерванное
    /// сохранение не оставляет ни `.tmp`, ни дорожки без метаданных.
    pub async fn save(&self, record: &DubTrackRecord, mixed_path: &Path) -> Result<DubTrack> {
        tokio::fs::create_dir_all(&self.root).await?;
        self.remove_stale_temp_files(&record.source_id)?;

        let track_path = self.track_path(&record.source_id);
        let metadata_path = self.metadata_path(&record.source_id);
        let temp_track = self.temp_path(&record.source_id, "mp3");
        let temp_metadata = self.temp_path(&record.source_id, "json");
        let guard = TempFiles::new(vec![temp_track.clone(), temp_metadata.clone()]);

        tokio::fs::copy(mixed_path, &temp_track).await?;
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&temp_metadata, json).await?;

        // Метаданные переименовываются последними и служат признаком готовой записи
        let commit_track = track_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::rename(&temp_track, &commit_track)?;
            std::fs::rename(&temp_metadata, &metadata_path)
        })
        .await
        .map_err(|e| DubSyncError::Other(format!("Store commit task failed: {}", e)))??;
        guard.disarm();

        log::info!(
            "Saved dub track {} ({:.2}s) to {}",
            record.source_id,
            record.duration,
            track_path.display()
        );

        Ok(DubTrack {
            source_id: record.source_id.clone(),
            path: track_path,
            duration: record.duration,
            normalized: record.normalized,
        })
    }

    /// Загрузить метаданные дорожки; `None`, если дорожки нет
    pub async fn load(&self, id: &str) -> Result<Option<DubTrackRecord>> {
        let path = self.metadata_path(id);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }

    /// Все сохраненные дорожки, новые первыми
    ///
    /// Поврежденные файлы метаданных пропускаются с предупреждением.
    pub fn list(&self) -> Result<Vec<DubTrackRecord>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).max_depth(1) {
            let entry = entry.map_err(|e| DubSyncError::Other(format!("Failed to scan store: {}", e)))?;
            let path = entry.path();
            let is_metadata = path.extension().map(|ext| ext == "json").unwrap_or(false)
                && !path
                    .file_name()
                    .map(|name| name.to_string_lossy().starts_with('.'))
                    .unwrap_or(true);
            if !entry.file_type().is_file() || !is_metadata {
                continue;
            }

            let parsed = std::fs::read(path)
                .map_err(DubSyncError::from)
                .and_then(|content| serde_json::from_slice::<DubTrackRecord>(&content).map_err(DubSyncError::from));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Удалить дорожку и метаданные; `false`, если удалять было нечего
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut removed = false;
        for path in [self.track_path(id), self.metadata_path(id)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed {
            log::info!("Removed dub track {}", id);
        }
        Ok(removed)
    }
}

/// Временные файлы сохранения, удаляемые при выходе из области видимости
struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    fn disarm(mut self) {
        self.paths.clear();
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => log::debug!("Removed unfinished {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}
