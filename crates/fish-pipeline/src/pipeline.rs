//! Pipeline assembly.
//!
//! [`Pipeline::start`] builds one bus and attaches every stage to it:
//!
//! ```text
//! audio.recorded --SttStage--> stt.transcript --NluStage--> nlu.intent
//!     --Router--> skill.request --SkillRunner--> skill.response
//!     --Router--> tts.request
//! ```
//!
//! Each pipeline owns its bus; two pipelines never see each other's events.

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::skills::{EchoSkill, Skill, SkillRunner};
use crate::stt::{SttStage, Transcriber};
use fish_events::{AudioRecorded, Contract, CorrId, EventBus, Transcript};
use fish_nlu::{Classifier, NluStage};
use fish_router::Router;
use std::sync::Arc;
use tracing::info;

/// A running voice pipeline.
///
/// Stages stay subscribed for as long as the pipeline is alive; dropping it
/// turns every remaining delivery into a no-op.
pub struct Pipeline {
    bus: EventBus,
    config: PipelineConfig,
    router: Arc<Router>,
    nlu: Arc<NluStage>,
    stt: Option<Arc<SttStage>>,
    skills: Vec<Arc<SkillRunner>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("stt", &self.stt.is_some())
            .field("skills", &self.skills)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build the bus and attach all stages.
    ///
    /// The transcription stage is only attached when a `transcriber` is given;
    /// without one, input enters through [`submit_text`](Self::submit_text).
    pub async fn start(
        config: PipelineConfig,
        classifier: Arc<dyn Classifier>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let bus = EventBus::with_config(config.bus.clone());

        let stt = match transcriber {
            Some(transcriber) => Some(SttStage::attach(&bus, transcriber).await),
            None => None,
        };
        let nlu = NluStage::attach(&bus, classifier).await;

        let router = Router::attach(&bus).await;
        for (intent, skill) in &config.routes {
            router.register_route(intent.as_str(), skill.as_str()).await;
        }

        let mut pipeline = Self {
            bus,
            config,
            router,
            nlu,
            stt,
            skills: Vec::new(),
        };
        if pipeline.config.enable_echo {
            pipeline.add_skill(Arc::new(EchoSkill)).await;
        }

        info!(
            target: "pipeline",
            stt = pipeline.stt.is_some(),
            routes = pipeline.config.routes.len(),
            skills = pipeline.skills.len(),
            "pipeline started"
        );
        Ok(pipeline)
    }

    /// Host another skill on this pipeline's bus.
    pub async fn add_skill(&mut self, skill: Arc<dyn Skill>) {
        let runner = SkillRunner::attach(&self.bus, skill).await;
        self.skills.push(runner);
    }

    /// Start a new trace from typed text.
    pub async fn submit_text(&self, text: impl Into<String>) -> PipelineResult<CorrId> {
        let transcript = Transcript::new(text);
        self.bus.publish_contract(&transcript).await?;
        Ok(transcript.corr_id().clone())
    }

    /// Start a new trace from a recording on disk.
    pub async fn submit_audio(
        &self,
        wav_path: impl Into<String>,
        duration_s: f64,
    ) -> PipelineResult<CorrId> {
        let audio = AudioRecorded::new(wav_path, duration_s);
        self.bus.publish_contract(&audio).await?;
        Ok(audio.corr_id().clone())
    }

    /// The pipeline's bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The pipeline's router.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// The classification stage.
    pub fn nlu(&self) -> &Arc<NluStage> {
        &self.nlu
    }

    /// Configuration the pipeline was started with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the hosted skills.
    pub fn skill_names(&self) -> Vec<&str> {
        self.skills.iter().map(|runner| runner.skill_name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fish_events::testing::Recorder;
    use fish_events::{topics, SkillRequest, SpeechRequest};
    use fish_nlu::RulesClassifier;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_start_applies_routes_and_echo() {
        let config = PipelineConfig {
            routes: BTreeMap::from([("unknown".to_string(), "echo".to_string())]),
            ..Default::default()
        };
        let pipeline = Pipeline::start(config, Arc::new(RulesClassifier::new()), None)
            .await
            .unwrap();

        assert_eq!(pipeline.router().resolve("unknown").await, "echo");
        assert_eq!(pipeline.skill_names(), vec!["echo"]);
        assert_eq!(pipeline.bus().subscriber_count(topics::AUDIO_RECORDED).await, 0);
    }

    #[tokio::test]
    async fn test_submit_text_reaches_speech() {
        let config = PipelineConfig {
            routes: BTreeMap::from([("unknown".to_string(), "echo".to_string())]),
            ..Default::default()
        };
        let pipeline = Pipeline::start(config, Arc::new(RulesClassifier::new()), None)
            .await
            .unwrap();
        let speech = Recorder::attach(pipeline.bus(), topics::TTS_REQUEST).await;

        let corr_id = pipeline.submit_text("feed the fish").await.unwrap();

        let spoken: Vec<SpeechRequest> = speech.decoded();
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].text, "You said: feed the fish");
        assert_eq!(spoken[0].corr_id(), &corr_id);
    }

    #[tokio::test]
    async fn test_echo_disabled() {
        let config = PipelineConfig {
            enable_echo: false,
            ..Default::default()
        };
        let pipeline = Pipeline::start(config, Arc::new(RulesClassifier::new()), None)
            .await
            .unwrap();

        assert!(pipeline.skill_names().is_empty());
        assert_eq!(pipeline.bus().subscriber_count(topics::SKILL_REQUEST).await, 0);
    }

    #[tokio::test]
    async fn test_pipelines_are_isolated() {
        let a = Pipeline::start(PipelineConfig::default(), Arc::new(RulesClassifier::new()), None)
            .await
            .unwrap();
        let b = Pipeline::start(PipelineConfig::default(), Arc::new(RulesClassifier::new()), None)
            .await
            .unwrap();
        let requests_b = Recorder::attach(b.bus(), topics::SKILL_REQUEST).await;

        a.submit_text("what's the weather").await.unwrap();

        assert!(requests_b.decoded::<SkillRequest>().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            log_filter: String::new(),
            ..Default::default()
        };
        let result = Pipeline::start(config, Arc::new(RulesClassifier::new()), None).await;
        assert!(result.is_err());
    }
}
