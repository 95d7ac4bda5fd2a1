//! Тестовые заглушки внешних утилит и провайдеров
//!
//! `FakeAudioTool` хранит длительности файлов в памяти; файлы, которых нет в
//! таблице, читаются с диска в формате `dur=<секунды>`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use crate::config::{LoudnessConfig, TtsVoice};
use crate::error::{DubSyncError, Result};
use crate::media::audio::{build_mix_filter, AudioTool, MixInput};
use crate::models::{CaptionFragment, IndexedTranslation, SpeechUnit, SynthesizedClip, VideoInfo};
use crate::source::VideoSource;
use crate::translation::TranslationService;
use crate::tts::SpeechProvider;
use crate::utils::workspace::RunWorkspace;

/// Содержимое "аудиофайла" заданной длительности
pub fn fake_audio(duration: f64) -> Bytes {
    Bytes::from(format!("dur={}", duration))
}

fn read_fake_duration(path: &Path) -> Option<f64> {
    let content = std::fs::read_to_string(path).ok()?;
    content.trim().strip_prefix("dur=")?.parse().ok()
}

/// Записанный вызов сведения
#[derive(Debug, Clone)]
pub struct MixCall {
    pub inputs: Vec<MixInput>,
    pub total_duration: f64,
}

#[derive(Default)]
struct FakeState {
    durations: HashMap<PathBuf, f64>,
    tempo_calls: Vec<Vec<f64>>,
    mix_calls: Vec<MixCall>,
    normalize_calls: usize,
    fail_tempo: bool,
    fail_mix: bool,
    fail_normalize: bool,
    /// Добавка к длительности результатов сжатия и сведения
    output_padding: f64,
}

/// Аудиоутилита в памяти
#[derive(Default)]
pub struct FakeAudioTool {
    state: Mutex<FakeState>,
}

impl FakeAudioTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_duration(&self, path: &Path, duration: f64) {
        self.state.lock().durations.insert(path.to_path_buf(), duration);
    }

    pub fn fail_tempo(&self, fail: bool) {
        self.state.lock().fail_tempo = fail;
    }

    pub fn fail_mix(&self, fail: bool) {
        self.state.lock().fail_mix = fail;
    }

    pub fn fail_normalize(&self, fail: bool) {
        self.state.lock().fail_normalize = fail;
    }

    /// Результаты сжатия и сведения будут длиннее расчетных на `extra` секунд
    pub fn pad_outputs(&self, extra: f64) {
        self.state.lock().output_padding = extra;
    }

    fn padding(&self) -> f64 {
        self.state.lock().output_padding
    }

    pub fn tempo_calls(&self) -> Vec<Vec<f64>> {
        self.state.lock().tempo_calls.clone()
    }

    pub fn mix_calls(&self) -> Vec<MixCall> {
        self.state.lock().mix_calls.clone()
    }

    pub fn normalize_calls(&self) -> usize {
        self.state.lock().normalize_calls
    }

    fn write_output(&self, output: &Path, duration: f64) -> Result<()> {
        std::fs::write(output, fake_audio(duration))?;
        self.set_duration(output, duration);
        Ok(())
    }
}

#[async_trait]
impl AudioTool for FakeAudioTool {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        if let Some(duration) = self.state.lock().durations.get(path) {
            return Ok(*duration);
        }
        read_fake_duration(path)
            .ok_or_else(|| DubSyncError::AudioTool(format!("cannot probe {}", path.display())))
    }

    async fn change_tempo(&self, input: &Path, stages: &[f64], output: &Path) -> Result<()> {
        let fail = {
            let mut state = self.state.lock();
            state.tempo_calls.push(stages.to_vec());
            state.fail_tempo
        };
        if fail {
            return Err(DubSyncError::CompressionFailure("atempo exited with status 1".to_string()));
        }

        let input_duration = self.probe_duration(input).await?;
        let factor: f64 = stages.iter().product();
        self.write_output(output, input_duration / factor + self.padding())
    }

    async fn mix(
        &self,
        inputs: &[MixInput],
        total_duration: f64,
        filter_script: &Path,
        output: &Path,
    ) -> Result<()> {
        std::fs::write(filter_script, build_mix_filter(inputs, total_duration))?;
        let fail = {
            let mut state = self.state.lock();
            state.mix_calls.push(MixCall {
                inputs: inputs.to_vec(),
                total_duration,
            });
            state.fail_mix
        };
        if fail {
            return Err(DubSyncError::AudioTool("amix exited with status 1".to_string()));
        }
        self.write_output(output, total_duration + self.padding())
    }

    async fn normalize_loudness(
        &self,
        input: &Path,
        _target: &LoudnessConfig,
        output: &Path,
    ) -> Result<()> {
        let fail = {
            let mut state = self.state.lock();
            state.normalize_calls += 1;
            state.fail_normalize
        };
        if fail {
            return Err(DubSyncError::NormalizationFailure("loudnorm exited with status 1".to_string()));
        }
        let duration = self.probe_duration(input).await?;
        self.write_output(output, duration)
    }
}

/// Клип, записанный в рабочий каталог и зарегистрированный в заглушке
pub fn synthesized_clip(
    tool: &FakeAudioTool,
    workspace: &RunWorkspace,
    position: usize,
    unit: SpeechUnit,
    duration: f64,
) -> SynthesizedClip {
    let path = workspace.clip_path(position);
    std::fs::write(&path, fake_audio(duration)).unwrap();
    tool.set_duration(&path, duration);
    SynthesizedClip {
        unit,
        position,
        path,
        measured_duration: duration,
    }
}

#[derive(Default)]
struct ScriptState {
    failures_left: HashMap<String, usize>,
    calls: usize,
    texts: Vec<String>,
}

/// Провайдер речи по сценарию
///
/// Длительность ответа задается для каждого текста, по умолчанию общая.
pub struct ScriptedSpeechProvider {
    default_duration: f64,
    durations: HashMap<String, f64>,
    always_fail: bool,
    state: Mutex<ScriptState>,
}

impl ScriptedSpeechProvider {
    pub fn new(default_duration: f64) -> Self {
        Self {
            default_duration,
            durations: HashMap::new(),
            always_fail: false,
            state: Mutex::new(ScriptState::default()),
        }
    }

    /// Провайдер, у которого падает каждый вызов
    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new(1.0)
        }
    }

    pub fn with_duration(mut self, text: &str, duration: f64) -> Self {
        self.durations.insert(text.to_string(), duration);
        self
    }

    /// Первые `count` вызовов для текста завершаются ошибкой
    pub fn failing_first(self, text: &str, count: usize) -> Self {
        self.state.lock().failures_left.insert(text.to_string(), count);
        self
    }

    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    pub fn texts(&self) -> Vec<String> {
        self.state.lock().texts.clone()
    }
}

#[async_trait]
impl SpeechProvider for ScriptedSpeechProvider {
    async fn synthesize(&self, text: &str, _voice: &TtsVoice) -> Result<Bytes> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.texts.push(text.to_string());

        if self.always_fail {
            return Err(DubSyncError::Api("status 500".to_string()));
        }
        if let Some(left) = state.failures_left.get_mut(text) {
            if *left > 0 {
                *left -= 1;
                return Err(DubSyncError::Api("status 429".to_string()));
            }
        }

        let duration = self.durations.get(text).copied().unwrap_or(self.default_duration);
        Ok(fake_audio(duration))
    }
}

/// Переводчик с заранее заданным ответом
pub struct CannedTranslator {
    reply: Vec<IndexedTranslation>,
}

impl CannedTranslator {
    pub fn new(reply: Vec<IndexedTranslation>) -> Self {
        Self { reply }
    }
}

#[async_trait]
impl TranslationService for CannedTranslator {
    async fn translate(&self, _units: &[SpeechUnit]) -> Result<Vec<IndexedTranslation>> {
        Ok(self.reply.clone())
    }
}

/// Источник с заданными длительностью и субтитрами
pub struct FakeVideoSource {
    info: VideoInfo,
    fragments: Vec<CaptionFragment>,
}

impl FakeVideoSource {
    pub fn new(total_duration: f64, fragments: Vec<CaptionFragment>) -> Self {
        Self {
            info: VideoInfo {
                total_duration,
                title: "fake video".to_string(),
                thumbnail: None,
            },
            fragments,
        }
    }
}

#[async_trait]
impl VideoSource for FakeVideoSource {
    async fn fetch(&self, _url: &str) -> Result<VideoInfo> {
        Ok(self.info.clone())
    }

    async fn fetch_captions(&self, url: &str) -> Result<Vec<CaptionFragment>> {
        if self.fragments.is_empty() {
            return Err(DubSyncError::NoCaptionsAvailable(url.to_string()));
        }
        Ok(self.fragments.clone())
    }
}
