//! End-to-end tests: recording in, speech out, one trace.

use async_trait::async_trait;
use fish_events::testing::Recorder;
use fish_events::{
    topics, BusConfig, Contract, Intent, SkillRequest, SkillResponse, SpeechRequest, Transcript,
};
use fish_nlu::RulesClassifier;
use fish_pipeline::{Pipeline, PipelineConfig, TranscribeError, Transcriber};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

struct ScriptedTranscriber(&'static str);

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _wav_path: &Path) -> Result<String, TranscribeError> {
        Ok(self.0.to_string())
    }
}

fn temp_wav(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("fish-e2e-{}-{}.wav", name, std::process::id()));
    std::fs::write(&path, b"RIFF").unwrap();
    path
}

fn echo_everything() -> PipelineConfig {
    let routes = ["unknown", "timer", "weather"]
        .iter()
        .map(|intent| (intent.to_string(), "echo".to_string()))
        .collect::<BTreeMap<_, _>>();
    PipelineConfig {
        routes,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_audio_to_speech_keeps_one_corr_id() {
    let pipeline = Pipeline::start(
        echo_everything(),
        Arc::new(RulesClassifier::new()),
        Some(Arc::new(ScriptedTranscriber(" set a timer for 2 min 30 s "))),
    )
    .await
    .unwrap();

    let bus = pipeline.bus();
    let transcripts = Recorder::attach(bus, topics::STT_TRANSCRIPT).await;
    let intents = Recorder::attach(bus, topics::NLU_INTENT).await;
    let requests = Recorder::attach(bus, topics::SKILL_REQUEST).await;
    let responses = Recorder::attach(bus, topics::SKILL_RESPONSE).await;
    let speech = Recorder::attach(bus, topics::TTS_REQUEST).await;

    let wav = temp_wav("timer");
    let corr_id = pipeline
        .submit_audio(wav.to_string_lossy(), 2.0)
        .await
        .unwrap();

    let transcript = &transcripts.decoded::<Transcript>()[0];
    let intent = &intents.decoded::<Intent>()[0];
    let request = &requests.decoded::<SkillRequest>()[0];
    let response = &responses.decoded::<SkillResponse>()[0];
    let spoken = speech.decoded::<SpeechRequest>();

    assert_eq!(transcript.text, "set a timer for 2 min 30 s");
    assert_eq!(intent.intent, "timer");
    assert_eq!(request.skill, "echo");
    assert_eq!(request.payload.entities["duration"]["seconds"], 150);
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "You said: set a timer for 2 min 30 s");

    for id in [
        transcript.corr_id(),
        intent.corr_id(),
        request.corr_id(),
        response.corr_id(),
        spoken[0].corr_id(),
    ] {
        assert_eq!(id, &corr_id);
    }
}

#[tokio::test]
async fn test_independent_utterances_get_distinct_traces() {
    let pipeline = Pipeline::start(echo_everything(), Arc::new(RulesClassifier::new()), None)
        .await
        .unwrap();
    let speech = Recorder::attach(pipeline.bus(), topics::TTS_REQUEST).await;

    let first = pipeline.submit_text("what's the weather").await.unwrap();
    let second = pipeline.submit_text("feed the fish").await.unwrap();

    let spoken = speech.decoded::<SpeechRequest>();
    assert_ne!(first, second);
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[0].corr_id(), &first);
    assert_eq!(spoken[1].corr_id(), &second);
}

#[tokio::test]
async fn test_silent_recording_resets_without_speech() {
    let pipeline = Pipeline::start(
        echo_everything(),
        Arc::new(RulesClassifier::new()),
        Some(Arc::new(ScriptedTranscriber("  "))),
    )
    .await
    .unwrap();
    let intents = Recorder::attach(pipeline.bus(), topics::NLU_INTENT).await;
    let requests = Recorder::attach(pipeline.bus(), topics::SKILL_REQUEST).await;
    let speech = Recorder::attach(pipeline.bus(), topics::TTS_REQUEST).await;

    let wav = temp_wav("silent");
    let corr_id = pipeline
        .submit_audio(wav.to_string_lossy(), 0.3)
        .await
        .unwrap();

    let intents = intents.decoded::<Intent>();
    assert_eq!(intents.len(), 1);
    assert!(intents[0].is_reset());
    assert_eq!(intents[0].corr_id(), &corr_id);
    assert!(requests.is_empty());
    assert!(speech.is_empty());
}

#[tokio::test]
async fn test_unrouted_intent_produces_no_speech() {
    let config = PipelineConfig {
        enable_echo: false,
        ..Default::default()
    };
    let pipeline = Pipeline::start(config, Arc::new(RulesClassifier::new()), None)
        .await
        .unwrap();
    let speech = Recorder::attach(pipeline.bus(), topics::TTS_REQUEST).await;

    // routed to a "weather" skill that nobody hosts
    pipeline.submit_text("what's the weather").await.unwrap();

    assert!(speech.is_empty());
    assert_eq!(pipeline.bus().stats().await.unrouted_events, 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_subscriber_is_detached() {
    let config = PipelineConfig {
        bus: BusConfig::with_subscriber_timeout(Duration::from_millis(100)),
        ..echo_everything()
    };
    let pipeline = Pipeline::start(config, Arc::new(RulesClassifier::new()), None)
        .await
        .unwrap();
    let speech = Recorder::attach(pipeline.bus(), topics::TTS_REQUEST).await;

    pipeline
        .bus()
        .subscribe_fn(topics::NLU_INTENT, "stuck", |_payload| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), fish_events::BusError>(())
        })
        .await;

    pipeline.submit_text("feed the fish").await.unwrap();

    assert_eq!(speech.decoded::<SpeechRequest>()[0].text, "You said: feed the fish");
    assert!(pipeline.bus().stats().await.detached_deliveries >= 1);
}
