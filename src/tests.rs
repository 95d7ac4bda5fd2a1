//! Сквозные сценарии конвейера на заглушках

use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use crate::config::{MergeConfig, SynthesisConfig};
use crate::media::audio::AudioTool;
use crate::models::{CaptionFragment, IndexedTranslation};
use crate::store::DubTrackStore;
use crate::testing::{CannedTranslator, FakeAudioTool, FakeVideoSource, ScriptedSpeechProvider};
use crate::translation::{IdentityTranslator, TranslationService};
use crate::{DubSync, DubSyncConfig, DubSyncError};

const URL: &str = "https://video.example/watch?v=42";

fn test_config(output: &TempDir) -> DubSyncConfig {
    DubSyncConfig {
        output_dir: output.path().join("dubs"),
        merge: MergeConfig {
            gap_threshold: 0.1,
            max_unit_span: 3.0,
        },
        synthesis: SynthesisConfig {
            retry_backoff_ms: 0,
            pacing_delay_ms: 0,
        },
        ..DubSyncConfig::default()
    }
}

fn dub_sync(
    output: &TempDir,
    source: FakeVideoSource,
    translator: Arc<dyn TranslationService>,
    provider: Arc<ScriptedSpeechProvider>,
    tool: Arc<FakeAudioTool>,
) -> DubSync {
    DubSync::with_components(test_config(output), Arc::new(source), translator, provider, tool)
}

fn three_fragments() -> Vec<CaptionFragment> {
    vec![
        CaptionFragment::new(0.0, 2.0, "a"),
        CaptionFragment::new(2.0, 4.0, "b"),
        CaptionFragment::new(4.0, 6.0, "c"),
    ]
}

#[tokio::test]
async fn test_exact_length_clips_need_no_adjustment() {
    let output = tempfile::tempdir().unwrap();
    let tool = Arc::new(FakeAudioTool::new());
    let provider = Arc::new(ScriptedSpeechProvider::new(2.0));
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(6.0, three_fragments()),
        Arc::new(IdentityTranslator),
        provider.clone(),
        tool.clone(),
    );

    let track = assert_ok!(dub.process(URL).await);

    assert_eq!(track.duration, 6.0);
    assert!(track.normalized);
    assert_eq!(track.source_id, DubTrackStore::source_id(URL));
    assert!(track.path.exists());
    assert!(tool.tempo_calls().is_empty());

    let mix = &tool.mix_calls()[0];
    let delays: Vec<u64> = mix.inputs.iter().map(|input| input.delay_ms).collect();
    assert_eq!(delays, vec![0, 2000, 4000]);
    assert_eq!(mix.total_duration, 6.0);
    assert_eq!(provider.texts(), vec!["a", "b", "c"]);

    let records = dub.store().list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].clips, 3);
}

#[tokio::test]
async fn test_overlong_clip_capped_at_max_speedup() {
    let output = tempfile::tempdir().unwrap();
    let tool = Arc::new(FakeAudioTool::new());
    let provider = Arc::new(ScriptedSpeechProvider::new(0.5).with_duration("a", 4.0));
    let fragments = vec![
        CaptionFragment::new(0.0, 1.0, "a"),
        CaptionFragment::new(1.2, 2.0, "b"),
    ];
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(3.0, fragments),
        Arc::new(IdentityTranslator),
        provider,
        tool.clone(),
    );

    assert_ok!(dub.process(URL).await);

    let tempo = tool.tempo_calls();
    assert_eq!(tempo.len(), 1);
    assert!((tempo[0].iter().product::<f64>() - 3.0).abs() < 1e-9);
    assert!(tempo[0].iter().all(|stage| *stage <= 2.0));

    let mix = &tool.mix_calls()[0];
    let adjusted = &mix.inputs[0].path;
    assert!(adjusted.to_string_lossy().ends_with("segment_0000_adjusted.wav"));
    assert_eq!(mix.inputs[0].delay_ms, 0);
    assert_eq!(mix.inputs[1].delay_ms, 1200);

    let effective = tool.probe_duration(adjusted).await.unwrap();
    assert!((effective - 4.0 / 3.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_duplicate_and_missing_translations() {
    let output = tempfile::tempdir().unwrap();
    let tool = Arc::new(FakeAudioTool::new());
    let provider = Arc::new(ScriptedSpeechProvider::new(1.0));
    let fragments = vec![
        CaptionFragment::new(0.0, 1.0, "one"),
        CaptionFragment::new(2.0, 3.0, "two"),
        CaptionFragment::new(4.0, 5.0, "three"),
    ];
    let translator = CannedTranslator::new(vec![
        IndexedTranslation::new(2, "три"),
        IndexedTranslation::new(0, "раз"),
        IndexedTranslation::new(2, "снова три"),
    ]);
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(6.0, fragments),
        Arc::new(translator),
        provider.clone(),
        tool.clone(),
    );

    let track = assert_ok!(dub.process(URL).await);

    assert_eq!(provider.texts(), vec!["раз", "три"]);
    let delays: Vec<u64> = tool.mix_calls()[0].inputs.iter().map(|input| input.delay_ms).collect();
    assert_eq!(delays, vec![0, 4000]);
    assert_eq!(dub.store().load(&track.source_id).await.unwrap().unwrap().clips, 2);
}

#[tokio::test]
async fn test_all_synthesis_failures_write_nothing() {
    let output = tempfile::tempdir().unwrap();
    let tool = Arc::new(FakeAudioTool::new());
    let provider = Arc::new(ScriptedSpeechProvider::always_failing());
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(6.0, three_fragments()),
        Arc::new(IdentityTranslator),
        provider.clone(),
        tool.clone(),
    );

    let result = dub.process(URL).await;

    match result {
        Err(DubSyncError::NoUsableSegments { stage, input }) => {
            assert_eq!(stage, "synthesis");
            assert_eq!(input, 3);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    // Одна попытка и один повтор на каждый юнит
    assert_eq!(provider.calls(), 6);
    assert!(tool.mix_calls().is_empty());
    assert!(!dub.store().track_path(&DubTrackStore::source_id(URL)).exists());
    assert!(dub.store().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_captions_propagate() {
    let output = tempfile::tempdir().unwrap();
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(6.0, Vec::new()),
        Arc::new(IdentityTranslator),
        Arc::new(ScriptedSpeechProvider::new(1.0)),
        Arc::new(FakeAudioTool::new()),
    );

    let result = dub.process(URL).await;
    assert!(matches!(result, Err(DubSyncError::NoCaptionsAvailable(_))));
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let output = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedSpeechProvider::new(1.0));
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(6.0, three_fragments()),
        Arc::new(IdentityTranslator),
        provider.clone(),
        Arc::new(FakeAudioTool::new()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = dub.process_with_cancel(URL, cancel).await;

    assert!(matches!(result, Err(DubSyncError::Cancelled)));
    assert_eq!(provider.calls(), 0);
    assert!(dub.store().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_mix_failure_is_fatal() {
    let output = tempfile::tempdir().unwrap();
    let tool = Arc::new(FakeAudioTool::new());
    tool.fail_mix(true);
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(6.0, three_fragments()),
        Arc::new(IdentityTranslator),
        Arc::new(ScriptedSpeechProvider::new(2.0)),
        tool,
    );

    let result = dub.process(URL).await;

    assert!(matches!(result, Err(DubSyncError::CompositeFailure { stage: "mix", clips: 3, .. })));
    assert!(dub.store().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_overlong_mix_reported_at_video_length() {
    let output = tempfile::tempdir().unwrap();
    let tool = Arc::new(FakeAudioTool::new());
    // Хвост amix длиннее видео на 0.7s
    tool.pad_outputs(0.7);
    let dub = dub_sync(
        &output,
        FakeVideoSource::new(6.0, three_fragments()),
        Arc::new(IdentityTranslator),
        Arc::new(ScriptedSpeechProvider::new(2.0)),
        tool.clone(),
    );

    let track = assert_ok!(dub.process(URL).await);

    assert!((tool.probe_duration(&track.path).await.unwrap() - 6.7).abs() < 1e-9);
    assert_eq!(track.duration, 6.0);
    let record = dub.store().load(&track.source_id).await.unwrap().unwrap();
    assert_eq!(record.duration, 6.0);
    assert_eq!(record.total_duration, 6.0);
}
