//! Skill hosting.
//!
//! A [`Skill`] answers the skill requests addressed to its name. The
//! [`SkillRunner`] connects one skill to the bus: it filters `skill.request`
//! by name and publishes the reply as `skill.response` in the request's trace.

use async_trait::async_trait;
use fish_events::{
    topics, weak_subscriber, BusResult, Contract, EventBus, Payload, SkillRequest, SkillResponse,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A named capability that answers skill requests.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Skill identifier requests are addressed to.
    fn name(&self) -> &str;

    /// Produce the text to speak, or `None` to stay silent.
    ///
    /// A silent skill publishes no response at all.
    async fn respond(&self, request: &SkillRequest) -> Option<String>;
}

/// Connects a [`Skill`] to the bus.
pub struct SkillRunner {
    bus: EventBus,
    skill: Arc<dyn Skill>,
}

impl std::fmt::Debug for SkillRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRunner")
            .field("skill", &self.skill.name())
            .finish_non_exhaustive()
    }
}

impl SkillRunner {
    /// Create a runner without subscribing it.
    pub fn new(bus: EventBus, skill: Arc<dyn Skill>) -> Self {
        Self { bus, skill }
    }

    /// Create a runner and subscribe it to `skill.request`.
    #[must_use = "the component stops receiving events once the returned Arc is dropped"]
    pub async fn attach(bus: &EventBus, skill: Arc<dyn Skill>) -> Arc<Self> {
        let name = format!("skill.{}", skill.name());
        let runner = Arc::new(Self::new(bus.clone(), skill));
        bus.subscribe(
            topics::SKILL_REQUEST,
            weak_subscriber(name, &runner, |runner: Arc<Self>, payload| async move {
                runner.on_request(payload).await
            }),
        )
        .await;
        runner
    }

    /// Name of the hosted skill.
    pub fn skill_name(&self) -> &str {
        self.skill.name()
    }

    /// Handle one `skill.request` payload.
    pub async fn on_request(&self, payload: Payload) -> BusResult<()> {
        let request = match SkillRequest::from_payload(&payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    target: "skill",
                    skill = %self.skill.name(),
                    error = %e,
                    "malformed skill.request, skipping"
                );
                return Ok(());
            }
        };

        if request.skill != self.skill.name() {
            return Ok(());
        }

        let Some(say) = self.skill.respond(&request).await else {
            debug!(
                target: "skill",
                skill = %request.skill,
                corr_id = %request.corr_id(),
                "skill has no reply"
            );
            return Ok(());
        };

        info!(
            target: "skill",
            skill = %request.skill,
            corr_id = %request.corr_id(),
            "skill replied"
        );
        let response = SkillResponse::new(self.skill.name(), Some(say)).with_trace_of(&request);
        self.bus.publish_contract(&response).await?;
        Ok(())
    }
}

// ============================================================================
// Built-in skills
// ============================================================================

/// Repeats what the user said. Useful for checking the whole pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoSkill;

impl EchoSkill {
    /// Skill identifier.
    pub const NAME: &'static str = "echo";
}

#[async_trait]
impl Skill for EchoSkill {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn respond(&self, request: &SkillRequest) -> Option<String> {
        let text = request.payload.original_text.trim();
        if text.is_empty() {
            warn!(target: "skill", corr_id = %request.corr_id(), "echo request without text");
            return None;
        }
        Some(format!("You said: {}", text))
    }
}
