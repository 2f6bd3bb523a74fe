//! # Fish NLU
//!
//! Intent classification for the Fish Assistant pipeline.
//!
//! ## Overview
//!
//! The fish-nlu crate provides:
//! - **Classifier**: A pluggable text-to-intent capability
//! - **Rules Classifier**: The default ordered-regex implementation
//! - **NLU Stage**: The bus component that consumes `stt.transcript` and
//!   publishes `nlu.intent` in the same trace
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fish_events::EventBus;
//! use fish_nlu::{NluStage, RulesClassifier};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let bus = EventBus::new();
//!     let _nlu = NluStage::attach(&bus, Arc::new(RulesClassifier::new())).await;
//! }
//! ```
//!
//! Any other classifier can be plugged in by implementing [`Classifier`].

pub mod classifier;
pub mod rules;
pub mod stage;

pub use classifier::{Classification, Classifier};
pub use rules::{duration_seconds, RulesClassifier, UNKNOWN_INTENT};
pub use stage::NluStage;
