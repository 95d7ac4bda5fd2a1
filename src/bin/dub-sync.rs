//! Командная строка для сборки дубляжа
//!
//! Использование:
//!   dub-sync <путь к видео> [config.json]
//!   dub-sync --list [config.json]

use anyhow::{bail, Context, Result};
use dub_sync::media::audio::FfmpegAudioTool;
use dub_sync::progress::{DefaultProgressReporter, LogProgressObserver, ProgressReporter};
use dub_sync::{DubSync, DubSyncConfig};
use tokio_util::sync::CancellationToken;

fn load_config(path: Option<&String>) -> Result<DubSyncConfig> {
    let config = match path {
        Some(path) => DubSyncConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => DubSyncConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Инициализируем логирование
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(first) = args.first() else {
        bail!("usage: dub-sync <video path> [config.json] | dub-sync --list [config.json]");
    };

    if first == "--list" {
        let config = load_config(args.get(1))?;
        let store = dub_sync::store::DubTrackStore::new(config.output_dir);
        for record in store.list()? {
            println!(
                "{}  {}  {:>8.2}s  {}  {}",
                record.created_at.format("%Y-%m-%d %H:%M:%S"),
                record.source_id,
                record.duration,
                record.target_language,
                record.title
            );
        }
        return Ok(());
    }

    let config = load_config(args.get(1))?;
    FfmpegAudioTool::from_config(&config)
        .ensure_available()
        .await
        .context("ffmpeg is required")?;

    let mut reporter = DefaultProgressReporter::new();
    reporter.add_observer(Box::new(LogProgressObserver));
    let dub_sync = DubSync::with_progress_reporter(config, Box::new(reporter))
        .context("Failed to initialize dub-sync")?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling");
            ctrl_c_token.cancel();
        }
    });

    let track = dub_sync
        .process_with_cancel(first, cancel)
        .await
        .with_context(|| format!("Failed to build dub track for {}", first))?;

    println!("{}", track.path.display());
    Ok(())
}
