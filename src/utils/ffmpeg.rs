//! Модуль для работы с FFmpeg
//!
//! Запуск ffmpeg/ffprobe как дочерних процессов. Ненулевой код выхода всегда
//! является ошибкой этапа, текст stderr сохраняется в ошибке.

use std::process::{Output, Stdio};
use tokio::process::Command;
use crate::error::{DubSyncError, Result};

/// Сколько последних строк stderr попадает в сообщение об ошибке
const STDERR_TAIL_LINES: usize = 8;

/// Проверка наличия утилиты (ffmpeg или ffprobe)
pub async fn check_tool_installed(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Запуск команды и ожидание ее завершения
///
/// Процесс убивается, если future будет сброшен (например, при отмене запуска).
pub async fn run_tool(program: &str, args: &[String]) -> Result<Output> {
    log::debug!("Running {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DubSyncError::AudioTool(format!("Failed to start {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DubSyncError::AudioTool(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr_tail(&stderr)
        )));
    }

    Ok(output)
}

/// Последние строки stderr для сообщения об ошибке
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join(" | ")
}
