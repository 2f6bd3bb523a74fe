//! Event contracts exchanged on the bus
//!
//! Every pipeline boundary has one envelope type. Each envelope carries a
//! [`CorrId`] that is generated at the origin of a trace and copied, never
//! regenerated, by every event caused by it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Flat key-value form an envelope takes while crossing the bus.
pub type Payload = Map<String, Value>;

/// Well-known topics, one per pipeline boundary.
pub mod topics {
    /// Raw audio was captured and written to disk.
    pub const AUDIO_RECORDED: &str = "audio.recorded";
    /// Speech-to-text produced a transcript.
    pub const STT_TRANSCRIPT: &str = "stt.transcript";
    /// A transcript was classified into an intent.
    pub const NLU_INTENT: &str = "nlu.intent";
    /// An intent was routed to a skill.
    pub const SKILL_REQUEST: &str = "skill.request";
    /// A skill answered a request.
    pub const SKILL_RESPONSE: &str = "skill.response";
    /// Text that should be spoken.
    pub const TTS_REQUEST: &str = "tts.request";
}

/// Contract error types.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Payload does not match the envelope shape of its topic
    #[error("Malformed {topic} payload: {reason}")]
    Malformed {
        /// Topic the payload was decoded for
        topic: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Envelope could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;

/// Correlation identifier shared by all events of one causal chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrId(String);

impl CorrId {
    /// Generate an identifier for a new trace.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A typed, correlation-tagged envelope bound to a fixed topic.
pub trait Contract: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Topic this envelope is published on.
    const TOPIC: &'static str;

    /// Correlation identifier of the trace this envelope belongs to.
    fn corr_id(&self) -> &CorrId;

    /// Mutable access used by [`same_trace`].
    fn corr_id_mut(&mut self) -> &mut CorrId;

    /// Topic of this envelope.
    fn topic(&self) -> &'static str {
        Self::TOPIC
    }

    /// Encode into the flat key-value form.
    fn to_payload(&self) -> ContractResult<Payload> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ContractError::Serialization(format!(
                "{} encoded to a non-object value: {}",
                Self::TOPIC,
                other
            ))),
            Err(e) => Err(ContractError::Serialization(e.to_string())),
        }
    }

    /// Decode from the flat key-value form.
    ///
    /// Missing required fields and mistyped values yield
    /// [`ContractError::Malformed`].
    fn from_payload(payload: &Payload) -> ContractResult<Self> {
        serde_json::from_value(Value::Object(payload.clone())).map_err(|e| {
            ContractError::Malformed {
                topic: Self::TOPIC,
                reason: e.to_string(),
            }
        })
    }

    /// Move this envelope into the trace of `cause`.
    fn with_trace_of<C: Contract>(mut self, cause: &C) -> Self {
        same_trace(cause, &mut self);
        self
    }
}

/// Copy the correlation identifier of `cause` onto `effect`.
pub fn same_trace<C: Contract, E: Contract>(cause: &C, effect: &mut E) {
    *effect.corr_id_mut() = cause.corr_id().clone();
}

macro_rules! impl_contract {
    ($ty:ty, $topic:expr) => {
        impl Contract for $ty {
            const TOPIC: &'static str = $topic;

            fn corr_id(&self) -> &CorrId {
                &self.corr_id
            }

            fn corr_id_mut(&mut self) -> &mut CorrId {
                &mut self.corr_id
            }
        }
    };
}

// ============================================================================
// Capture / Transcription
// ============================================================================

/// Audio captured to a WAV file. Origin of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRecorded {
    /// Path of the recorded WAV file
    pub wav_path: String,

    /// Recording length in seconds
    pub duration_s: f64,

    /// When recording finished
    pub recorded_at: DateTime<Utc>,

    /// Correlation ID for tracing
    pub corr_id: CorrId,
}

impl AudioRecorded {
    /// Start a new trace for a finished recording.
    pub fn new(wav_path: impl Into<String>, duration_s: f64) -> Self {
        Self {
            wav_path: wav_path.into(),
            duration_s,
            recorded_at: Utc::now(),
            corr_id: CorrId::generate(),
        }
    }
}

impl_contract!(AudioRecorded, topics::AUDIO_RECORDED);

/// Speech-to-text output. Empty text signals a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcribed text
    pub text: String,

    /// Correlation ID for tracing
    pub corr_id: CorrId,
}

impl Transcript {
    /// Create a transcript in a fresh trace.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            corr_id: CorrId::generate(),
        }
    }
}

impl_contract!(Transcript, topics::STT_TRANSCRIPT);

// ============================================================================
// Classification / Routing
// ============================================================================

/// Classified transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent label (e.g. "timer", "weather")
    pub intent: String,

    /// Extracted entities
    #[serde(default)]
    pub entities: Map<String, Value>,

    /// Classifier confidence in [0, 1]
    pub confidence: f64,

    /// Text the intent was classified from
    pub original_text: String,

    /// Correlation ID for tracing
    pub corr_id: CorrId,
}

impl Intent {
    /// Create an intent in a fresh trace.
    pub fn new(
        intent: impl Into<String>,
        entities: Map<String, Value>,
        confidence: f64,
        original_text: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            entities,
            confidence,
            original_text: original_text.into(),
            corr_id: CorrId::generate(),
        }
    }

    /// Intent published for a blank transcript.
    ///
    /// Carries no label, so the router drops it; other consumers of
    /// `nlu.intent` treat it as "nothing was said" and return to idle.
    pub fn reset() -> Self {
        Self::new("", Map::new(), 0.0, "")
    }

    /// Whether this is the blank-transcript reset signal.
    pub fn is_reset(&self) -> bool {
        self.intent.is_empty() && self.original_text.is_empty()
    }
}

impl_contract!(Intent, topics::NLU_INTENT);

/// Data handed to a skill alongside its name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillPayload {
    /// Entities from the intent
    #[serde(default)]
    pub entities: Map<String, Value>,

    /// Text the intent was classified from
    #[serde(default)]
    pub original_text: String,

    /// Classifier confidence
    #[serde(default)]
    pub confidence: f64,
}

/// Request for a named skill to handle an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRequest {
    /// Skill identifier the request is addressed to
    pub skill: String,

    /// Request data
    #[serde(default)]
    pub payload: SkillPayload,

    /// Correlation ID for tracing
    pub corr_id: CorrId,
}

impl SkillRequest {
    /// Create a request in a fresh trace.
    pub fn new(skill: impl Into<String>, payload: SkillPayload) -> Self {
        Self {
            skill: skill.into(),
            payload,
            corr_id: CorrId::generate(),
        }
    }
}

impl_contract!(SkillRequest, topics::SKILL_REQUEST);

/// A skill's answer. `say` is absent when the skill has nothing to speak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResponse {
    /// Skill that produced the response
    pub skill: String,

    /// Text to speak, if any
    #[serde(default)]
    pub say: Option<String>,

    /// Correlation ID for tracing
    pub corr_id: CorrId,
}

impl SkillResponse {
    /// Create a response in a fresh trace.
    pub fn new(skill: impl Into<String>, say: Option<String>) -> Self {
        Self {
            skill: skill.into(),
            say,
            corr_id: CorrId::generate(),
        }
    }

    /// Text to speak, treating an empty string as nothing.
    pub fn say_text(&self) -> Option<&str> {
        self.say.as_deref().filter(|s| !s.is_empty())
    }
}

impl_contract!(SkillResponse, topics::SKILL_RESPONSE);

// ============================================================================
// Synthesis
// ============================================================================

/// Text handed to speech synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,

    /// Correlation ID for tracing
    pub corr_id: CorrId,
}

impl SpeechRequest {
    /// Create a speech request in a fresh trace.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            corr_id: CorrId::generate(),
        }
    }
}

impl_contract!(SpeechRequest, topics::TTS_REQUEST);
