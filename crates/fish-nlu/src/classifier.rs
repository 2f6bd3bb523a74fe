//! Classification capability interface.

use async_trait::async_trait;
use fish_events::Intent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of classifying one transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Intent label
    pub intent: String,

    /// Extracted entities
    pub entities: Map<String, Value>,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Text that was classified, verbatim
    pub original_text: String,
}

impl Classification {
    /// Create a classification without entities.
    pub fn new(
        intent: impl Into<String>,
        confidence: f64,
        original_text: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            entities: Map::new(),
            confidence,
            original_text: original_text.into(),
        }
    }

    /// Convert into an intent envelope.
    ///
    /// The envelope starts a fresh trace; callers move it into the trace of
    /// the transcript with [`Contract::with_trace_of`](fish_events::Contract::with_trace_of).
    pub fn into_intent(self) -> Intent {
        Intent::new(self.intent, self.entities, self.confidence, self.original_text)
    }
}

/// Pluggable text-to-intent classification.
///
/// Implementations must be side-effect free and deterministic for a fixed
/// configuration. Callers never pass blank text.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a non-empty transcript.
    async fn classify(&self, text: &str) -> Classification;
}
