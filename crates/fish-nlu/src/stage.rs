//! Classification stage.
//!
//! Listens on `stt.transcript` and emits `nlu.intent`.

use crate::classifier::Classifier;
use fish_events::{
    topics, weak_subscriber, BusResult, Contract, EventBus, Intent, Payload, Transcript,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Bus component that turns transcripts into intents.
pub struct NluStage {
    bus: EventBus,
    classifier: Arc<dyn Classifier>,
}

impl NluStage {
    /// Create the stage without subscribing it.
    pub fn new(bus: EventBus, classifier: Arc<dyn Classifier>) -> Self {
        Self { bus, classifier }
    }

    /// Create the stage and subscribe it to `stt.transcript`.
    ///
    /// The bus only holds a weak reference; keep the returned `Arc` alive for
    /// as long as the stage should run.
    #[must_use = "the component stops receiving events once the returned Arc is dropped"]
    pub async fn attach(bus: &EventBus, classifier: Arc<dyn Classifier>) -> Arc<Self> {
        let stage = Arc::new(Self::new(bus.clone(), classifier));
        bus.subscribe(
            topics::STT_TRANSCRIPT,
            weak_subscriber("nlu.on_transcript", &stage, |stage: Arc<Self>, payload| async move {
                stage.on_transcript(payload).await
            }),
        )
        .await;
        stage
    }

    /// Handle one `stt.transcript` payload.
    ///
    /// Malformed payloads are logged and dropped. A blank transcript skips
    /// classification and publishes the reset intent instead.
    pub async fn on_transcript(&self, payload: Payload) -> BusResult<()> {
        let transcript = match Transcript::from_payload(&payload) {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(target: "nlu", error = %e, "malformed stt.transcript event, skipping");
                return Ok(());
            }
        };

        let text = transcript.text.trim();
        if text.is_empty() {
            warn!(
                target: "nlu",
                corr_id = %transcript.corr_id(),
                "empty transcript, publishing reset"
            );
            let reset = Intent::reset().with_trace_of(&transcript);
            self.bus.publish_contract(&reset).await?;
            return Ok(());
        }

        info!(target: "nlu", corr_id = %transcript.corr_id(), text, "classifying transcript");
        let result = self.classifier.classify(text).await;
        let intent = result.into_intent().with_trace_of(&transcript);

        info!(
            target: "nlu",
            corr_id = %intent.corr_id(),
            intent = %intent.intent,
            confidence = intent.confidence,
            "intent detected"
        );
        self.bus.publish_contract(&intent).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classification;
    use crate::rules::RulesClassifier;
    use async_trait::async_trait;
    use fish_events::testing::Recorder;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Classifier for CountingClassifier {
        async fn classify(&self, text: &str) -> Classification {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Classification::new("lights", 1.0, text)
        }
    }

    #[tokio::test]
    async fn test_transcript_becomes_intent_in_same_trace() {
        let bus = EventBus::new();
        let intents = Recorder::attach(&bus, topics::NLU_INTENT).await;
        let _stage = NluStage::attach(&bus, Arc::new(RulesClassifier::new())).await;

        let transcript = Transcript::new("set a timer for 2 min 30 s");
        bus.publish_contract(&transcript).await.unwrap();

        let published: Vec<Intent> = intents.decoded();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].intent, "timer");
        assert_eq!(published[0].entities["duration"]["seconds"], json!(150));
        assert_eq!(published[0].original_text, "set a timer for 2 min 30 s");
        assert_eq!(published[0].corr_id(), transcript.corr_id());
    }

    #[tokio::test]
    async fn test_blank_transcript_skips_classifier_and_resets() {
        let bus = EventBus::new();
        let intents = Recorder::attach(&bus, topics::NLU_INTENT).await;
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        });
        let _stage = NluStage::attach(&bus, classifier.clone()).await;

        let transcript = Transcript::new("   ");
        bus.publish_contract(&transcript).await.unwrap();

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        let published: Vec<Intent> = intents.decoded();
        assert_eq!(published.len(), 1);
        assert!(published[0].is_reset());
        assert_eq!(published[0].corr_id(), transcript.corr_id());
    }

    #[tokio::test]
    async fn test_malformed_transcript_is_dropped() {
        let bus = EventBus::new();
        let intents = Recorder::attach(&bus, topics::NLU_INTENT).await;
        let _stage = NluStage::attach(&bus, Arc::new(RulesClassifier::new())).await;

        let report = bus
            .publish(topics::STT_TRANSCRIPT, json!({"words": "hi"}).as_object().cloned().unwrap())
            .await;

        assert!(report.all_completed());
        assert!(intents.is_empty());
    }

    #[tokio::test]
    async fn test_custom_classifier_is_used() {
        let bus = EventBus::new();
        let intents = Recorder::attach(&bus, topics::NLU_INTENT).await;
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        });
        let _stage = NluStage::attach(&bus, classifier.clone()).await;

        bus.publish_contract(&Transcript::new("turn on the lights"))
            .await
            .unwrap();

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(intents.decoded::<Intent>()[0].intent, "lights");
    }
}
