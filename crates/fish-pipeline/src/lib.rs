//! # Fish Pipeline
//!
//! Assembles the Fish Assistant voice pipeline: transcription, intent
//! classification, routing and skills, all connected through one event bus.
//!
//! ## Overview
//!
//! The fish-pipeline crate provides:
//! - **Transcription stage**: `audio.recorded` -> `stt.transcript` via a pluggable [`Transcriber`]
//! - **Skill host**: [`Skill`] implementations answering `skill.request`
//! - **Pipeline**: wiring of every stage onto a fresh bus
//! - **Configuration**: [`PipelineConfig`] loaded from the environment
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fish_nlu::RulesClassifier;
//! use fish_pipeline::{Pipeline, PipelineConfig};
//! use std::sync::Arc;
//!
//! async fn example() -> fish_pipeline::PipelineResult<()> {
//!     let config = PipelineConfig::from_env()?;
//!     let pipeline = Pipeline::start(config, Arc::new(RulesClassifier::new()), None).await?;
//!
//!     let corr_id = pipeline.submit_text("set a timer for 5 minutes").await?;
//!     println!("started trace {}", corr_id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod skills;
pub mod stt;

pub use config::{parse_routes, ConfigError, ConfigResult, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::Pipeline;
pub use skills::{EchoSkill, Skill, SkillRunner};
pub use stt::{SttStage, TranscribeError, Transcriber};
