//! Рабочая директория одного запуска
//!
//! Все промежуточные файлы запуска живут в собственной временной директории.
//! Этапы получают пути отсюда и передают их дальше явно, а не ищут файлы по
//! соглашению об именах. При удалении объекта директория удаляется вместе с
//! недописанными файлами (если не включено сохранение для отладки).

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use crate::error::Result;

/// Рабочая директория запуска
pub struct RunWorkspace {
    temp_dir: Option<TempDir>,
    root: PathBuf,
    /// Сохранять файлы после завершения
    keep_files: bool,
}

impl RunWorkspace {
    /// Создать новую рабочую директорию
    pub fn new(cleanup: bool) -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("dub-sync-").tempdir()?;
        let root = temp_dir.path().to_path_buf();
        log::debug!("Created run workspace at {}", root.display());

        Ok(Self {
            temp_dir: Some(temp_dir),
            root,
            keep_files: !cleanup,
        })
    }

    /// Путь к рабочей директории
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Путь к синтезированному клипу юнита
    pub fn clip_path(&self, position: usize) -> PathBuf {
        self.root.join(format!("segment_{:04}.mp3", position))
    }

    /// Путь к итоговому ускоренному клипу
    pub fn adjusted_path(&self, position: usize) -> PathBuf {
        self.root.join(format!("segment_{:04}_adjusted.wav", position))
    }

    /// Путь к служебному файлу (описание графа фильтров и т.п.)
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Уникальный путь для результатов сведения
    pub fn unique_path(&self, prefix: &str, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension))
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        if let Some(dir) = self.temp_dir.take() {
            if self.keep_files {
                let kept = dir.into_path();
                log::info!("Keeping run workspace at {}", kept.display());
            }
            // Иначе TempDir удаляет директорию сам
        }
    }
}

/// Удалить файл, если он существует; ошибки только логируются
pub fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_paths_are_deterministic() {
        let workspace = RunWorkspace::new(true).unwrap();
        assert_eq!(workspace.clip_path(7), workspace.path().join("segment_0007.mp3"));
        assert_ne!(workspace.adjusted_path(7), workspace.clip_path(7));
        assert_ne!(workspace.unique_path("mix", "wav"), workspace.unique_path("mix", "wav"));
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let workspace = RunWorkspace::new(true).unwrap();
        let root = workspace.path().to_path_buf();
        std::fs::write(workspace.clip_path(0), b"partial").unwrap();
        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn test_workspace_kept_when_cleanup_disabled() {
        let workspace = RunWorkspace::new(false).unwrap();
        let root = workspace.path().to_path_buf();
        drop(workspace);
        assert!(root.exists());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_remove_quietly_ignores_missing() {
        let workspace = RunWorkspace::new(true).unwrap();
        let path = workspace.scratch_path("missing.txt");
        remove_quietly(&path);
        std::fs::write(&path, b"x").unwrap();
        remove_quietly(&path);
        assert!(!path.exists());
    }
}
