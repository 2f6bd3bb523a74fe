//! Test helpers for components that talk to the bus.
//!
//! Enabled with the `testing` feature.
//!
//! ```rust,no_run
//! use fish_events::testing::Recorder;
//! use fish_events::{EventBus, SpeechRequest, topics};
//! use std::sync::Arc;
//!
//! async fn example(bus: &EventBus) {
//!     let speech = Recorder::new("speech");
//!     bus.subscribe(topics::TTS_REQUEST, Arc::new(speech.clone())).await;
//!
//!     // ... drive the pipeline ...
//!
//!     let spoken: Vec<SpeechRequest> = speech.decoded();
//! }
//! ```

use crate::bus::{BusResult, EventBus, Subscriber};
use crate::contracts::{Contract, Payload};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Subscriber that stores every payload it receives.
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct Recorder {
    name: String,
    received: Arc<Mutex<Vec<Payload>>>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a recorder and subscribe it to `topic`.
    pub async fn attach(bus: &EventBus, topic: &str) -> Self {
        let recorder = Self::new(topic);
        bus.subscribe(topic, Arc::new(recorder.clone())).await;
        recorder
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Payload>> {
        self.received.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raw payloads received so far.
    pub fn payloads(&self) -> Vec<Payload> {
        self.lock().clone()
    }

    /// Payloads that decode as `C`, in arrival order.
    pub fn decoded<C: Contract>(&self) -> Vec<C> {
        self.lock()
            .iter()
            .filter_map(|p| C::from_payload(p).ok())
            .collect()
    }

    /// Number of payloads received.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was received.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl Subscriber for Recorder {
    async fn handle(&self, payload: Payload) -> BusResult<()> {
        self.lock().push(payload);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
