//! # Fish Events
//!
//! This crate provides the in-process event bus and the correlation-tagged
//! event contracts that connect the stages of the Fish Assistant voice
//! pipeline.
//!
//! ## Overview
//!
//! The fish-events crate handles:
//! - **Contracts**: One typed envelope per pipeline boundary
//! - **Correlation**: A trace identifier shared by every event of one utterance
//! - **Event Bus**: Topic-keyed publish/subscribe with concurrent fan-out
//! - **Failure Isolation**: Subscriber errors and panics never reach the publisher
//!
//! ## Pipeline Topics
//!
//! ```text
//! audio.recorded -> stt.transcript -> nlu.intent -> skill.request
//!                                                        |
//!                      tts.request <- skill.response <---+
//! ```
//!
//! Every event downstream of `audio.recorded` (or of a transcript submitted
//! directly) carries the same `corr_id`.
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust,no_run
//! use fish_events::{Contract, EventBus, Intent, Transcript};
//!
//! async fn publish_example() {
//!     let bus = EventBus::new();
//!
//!     // Start a trace
//!     let transcript = Transcript::new("what's the weather");
//!
//!     // Derive an effect in the same trace
//!     let intent = Intent::new("weather", Default::default(), 0.8, "what's the weather")
//!         .with_trace_of(&transcript);
//!
//!     bus.publish_contract(&intent).await.unwrap();
//! }
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust,no_run
//! use fish_events::{BusError, Contract, EventBus, Intent, topics};
//!
//! async fn subscribe_example() {
//!     let bus = EventBus::new();
//!
//!     bus.subscribe_fn(topics::NLU_INTENT, "printer", |payload| async move {
//!         let intent = Intent::from_payload(&payload)?;
//!         println!("{} ({})", intent.intent, intent.corr_id());
//!         Ok::<_, BusError>(())
//!     })
//!     .await;
//! }
//! ```
//!
//! ## Features
//!
//! - `testing`: a `Recorder` subscriber for capturing published payloads

pub mod bus;
pub mod config;
pub mod contracts;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export main types
pub use bus::{
    weak_subscriber, BusError, BusResult, EventBus, EventBusStats, FnSubscriber, PublishReport,
    Subscriber,
};
pub use config::BusConfig;
pub use contracts::{
    same_trace, topics, AudioRecorded, Contract, ContractError, ContractResult, CorrId, Intent,
    Payload, SkillPayload, SkillRequest, SkillResponse, SpeechRequest, Transcript,
};
