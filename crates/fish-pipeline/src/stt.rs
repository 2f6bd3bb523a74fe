//! Transcription stage.
//!
//! Listens on `audio.recorded` and emits `stt.transcript` through a pluggable
//! [`Transcriber`]. A recording that transcribes to nothing still produces an
//! empty transcript, so downstream stages can return to idle.

use async_trait::async_trait;
use fish_events::{
    topics, weak_subscriber, AudioRecorded, BusResult, Contract, EventBus, Payload, Transcript,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Transcription error types.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The audio file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The speech-to-text backend failed
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Speech-to-text backend.
///
/// Backends that block (local model inference) should move the work onto
/// `tokio::task::spawn_blocking` inside `transcribe`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the WAV file at `wav_path`.
    async fn transcribe(&self, wav_path: &Path) -> Result<String, TranscribeError>;
}

/// Bus component that turns recordings into transcripts.
pub struct SttStage {
    bus: EventBus,
    transcriber: Arc<dyn Transcriber>,
}

impl SttStage {
    /// Create the stage without subscribing it.
    pub fn new(bus: EventBus, transcriber: Arc<dyn Transcriber>) -> Self {
        Self { bus, transcriber }
    }

    /// Create the stage and subscribe it to `audio.recorded`.
    #[must_use = "the component stops receiving events once the returned Arc is dropped"]
    pub async fn attach(bus: &EventBus, transcriber: Arc<dyn Transcriber>) -> Arc<Self> {
        let stage = Arc::new(Self::new(bus.clone(), transcriber));
        bus.subscribe(
            topics::AUDIO_RECORDED,
            weak_subscriber("stt.on_recorded", &stage, |stage: Arc<Self>, payload| async move {
                stage.on_recorded(payload).await
            }),
        )
        .await;
        stage
    }

    /// Handle one `audio.recorded` payload.
    pub async fn on_recorded(&self, payload: Payload) -> BusResult<()> {
        let audio = match AudioRecorded::from_payload(&payload) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(target: "stt", error = %e, "malformed audio.recorded event, skipping");
                return Ok(());
            }
        };

        let wav_path = audio.wav_path.trim();
        if wav_path.is_empty() {
            debug!(target: "stt", corr_id = %audio.corr_id(), "empty wav_path, skipping");
            return Ok(());
        }

        let path = Path::new(wav_path);
        if !matches!(tokio::fs::try_exists(path).await, Ok(true)) {
            warn!(target: "stt", corr_id = %audio.corr_id(), wav_path, "audio file does not exist");
            return Ok(());
        }

        info!(
            target: "stt",
            corr_id = %audio.corr_id(),
            wav_path,
            duration_s = audio.duration_s,
            "transcribing audio"
        );
        let text = match self.transcriber.transcribe(path).await {
            Ok(text) => text,
            Err(e) => {
                error!(
                    target: "stt",
                    corr_id = %audio.corr_id(),
                    error = %e,
                    "transcription failed"
                );
                return Ok(());
            }
        };

        let text = text.trim();
        if text.is_empty() {
            warn!(
                target: "stt",
                corr_id = %audio.corr_id(),
                "empty transcription, publishing empty transcript"
            );
        }

        let transcript = Transcript::new(text).with_trace_of(&audio);
        self.bus.publish_contract(&transcript).await?;
        Ok(())
    }
}
