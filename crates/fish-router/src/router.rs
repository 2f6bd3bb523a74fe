//! Router implementation
//!
//! Subscribes to `nlu.intent` and `skill.response`. Intents become skill
//! requests addressed to the resolved skill; skill responses with something to
//! say become speech requests. Both keep the correlation ID of their cause.

use fish_events::{
    topics, weak_subscriber, BusResult, Contract, EventBus, Intent, Payload, SkillPayload,
    SkillRequest, SkillResponse, SpeechRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Intent-to-skill router.
pub struct Router {
    /// Bus the router publishes on
    bus: EventBus,

    /// Intent label -> skill identifier overrides
    routes: RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl Router {
    /// Create a router without subscribing it.
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Create a router and subscribe it to `nlu.intent` and `skill.response`.
    ///
    /// Keep the returned `Arc` alive; the bus only holds weak references.
    #[must_use = "the component stops receiving events once the returned Arc is dropped"]
    pub async fn attach(bus: &EventBus) -> Arc<Self> {
        let router = Arc::new(Self::new(bus.clone()));

        bus.subscribe(
            topics::NLU_INTENT,
            weak_subscriber("router.on_intent", &router, |router: Arc<Self>, payload| async move {
                router.on_intent(payload).await
            }),
        )
        .await;
        bus.subscribe(
            topics::SKILL_RESPONSE,
            weak_subscriber(
                "router.on_skill_response",
                &router,
                |router: Arc<Self>, payload| async move { router.on_skill_response(payload).await },
            ),
        )
        .await;

        router
    }

    /// Route `intent` to `skill`. The last registration for an intent wins.
    pub async fn register_route(&self, intent: impl Into<String>, skill: impl Into<String>) {
        let intent = intent.into();
        let skill = skill.into();
        debug!(target: "router", intent = %intent, skill = %skill, "route registered");
        self.routes.write().await.insert(intent, skill);
    }

    /// Skill an intent is routed to.
    ///
    /// Falls back to the intent label itself when no override exists.
    pub async fn resolve(&self, intent: &str) -> String {
        self.routes
            .read()
            .await
            .get(intent)
            .cloned()
            .unwrap_or_else(|| intent.to_string())
    }

    /// Snapshot of the override table.
    pub async fn routes(&self) -> HashMap<String, String> {
        self.routes.read().await.clone()
    }

    /// Handle one `nlu.intent` payload.
    pub async fn on_intent(&self, payload: Payload) -> BusResult<()> {
        let intent = match Intent::from_payload(&payload) {
            Ok(intent) => intent,
            Err(e) => {
                debug!(target: "router", error = %e, "dropping malformed intent");
                return Ok(());
            }
        };

        let skill = self.resolve(&intent.intent).await;
        if skill.is_empty() {
            debug!(target: "router", corr_id = %intent.corr_id(), "no skill for intent, dropping");
            return Ok(());
        }

        let payload = SkillPayload {
            entities: intent.entities.clone(),
            original_text: intent.original_text.clone(),
            confidence: intent.confidence,
        };
        let request = SkillRequest::new(skill, payload).with_trace_of(&intent);

        info!(
            target: "router",
            corr_id = %request.corr_id(),
            intent = %intent.intent,
            skill = %request.skill,
            "routing intent"
        );
        self.bus.publish_contract(&request).await?;
        Ok(())
    }

    /// Handle one `skill.response` payload.
    pub async fn on_skill_response(&self, payload: Payload) -> BusResult<()> {
        let response = match SkillResponse::from_payload(&payload) {
            Ok(response) => response,
            Err(e) => {
                debug!(target: "router", error = %e, "dropping malformed skill response");
                return Ok(());
            }
        };

        let Some(text) = response.say_text() else {
            debug!(
                target: "router",
                corr_id = %response.corr_id(),
                skill = %response.skill,
                "nothing to say"
            );
            return Ok(());
        };

        let speech = SpeechRequest::new(text).with_trace_of(&response);
        self.bus.publish_contract(&speech).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fish_events::testing::Recorder;
    use fish_events::Transcript;
    use serde_json::{json, Map};

    fn weather_intent() -> Intent {
        Intent::new("weather", Map::new(), 0.8, "what's the weather")
    }

    #[tokio::test]
    async fn test_identity_route() {
        let bus = EventBus::new();
        let requests = Recorder::attach(&bus, topics::SKILL_REQUEST).await;
        let _router = Router::attach(&bus).await;

        let intent = weather_intent();
        bus.publish_contract(&intent).await.unwrap();

        let published: Vec<SkillRequest> = requests.decoded();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].skill, "weather");
        assert_eq!(published[0].payload.original_text, "what's the weather");
        assert_eq!(published[0].payload.confidence, 0.8);
        assert_eq!(published[0].corr_id(), intent.corr_id());
    }

    #[tokio::test]
    async fn test_override_route() {
        let bus = EventBus::new();
        let requests = Recorder::attach(&bus, topics::SKILL_REQUEST).await;
        let router = Router::attach(&bus).await;

        router.register_route("weather", "weatherbot").await;
        bus.publish_contract(&weather_intent()).await.unwrap();

        assert_eq!(requests.decoded::<SkillRequest>()[0].skill, "weatherbot");
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let router = Router::new(EventBus::new());

        router.register_route("weather", "a").await;
        router.register_route("weather", "b").await;

        assert_eq!(router.resolve("weather").await, "b");
        assert_eq!(router.resolve("music").await, "music");
        assert_eq!(router.routes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_entities_forwarded() {
        let bus = EventBus::new();
        let requests = Recorder::attach(&bus, topics::SKILL_REQUEST).await;
        let _router = Router::attach(&bus).await;

        let mut entities = Map::new();
        entities.insert("duration".to_string(), json!({"seconds": 150}));
        bus.publish_contract(&Intent::new("timer", entities, 0.85, "set a timer for 2 min 30 s"))
            .await
            .unwrap();

        let published: Vec<SkillRequest> = requests.decoded();
        assert_eq!(published[0].payload.entities["duration"]["seconds"], json!(150));
    }

    #[tokio::test]
    async fn test_reset_intent_is_dropped() {
        let bus = EventBus::new();
        let requests = Recorder::attach(&bus, topics::SKILL_REQUEST).await;
        let _router = Router::attach(&bus).await;

        let reset = Intent::reset().with_trace_of(&Transcript::new(""));
        bus.publish_contract(&reset).await.unwrap();

        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_empty_route_target_is_dropped() {
        let bus = EventBus::new();
        let requests = Recorder::attach(&bus, topics::SKILL_REQUEST).await;
        let router = Router::attach(&bus).await;

        router.register_route("weather", "").await;
        bus.publish_contract(&weather_intent()).await.unwrap();

        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_intent_is_dropped() {
        let bus = EventBus::new();
        let requests = Recorder::attach(&bus, topics::SKILL_REQUEST).await;
        let _router = Router::attach(&bus).await;

        let payload = json!({"confidence": 0.5, "original_text": "hi", "corr_id": "abc"});
        let report = bus
            .publish(topics::NLU_INTENT, payload.as_object().cloned().unwrap())
            .await;

        assert!(report.all_completed());
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_skill_response_is_dropped() {
        let bus = EventBus::new();
        let speech = Recorder::attach(&bus, topics::TTS_REQUEST).await;
        let _router = Router::attach(&bus).await;

        let wrong_type = json!({"skill": "weather", "say": 5, "corr_id": "abc"});
        let report = bus
            .publish(topics::SKILL_RESPONSE, wrong_type.as_object().cloned().unwrap())
            .await;
        assert!(report.all_completed());

        let no_corr_id = json!({"skill": "weather", "say": "It's sunny"});
        let report = bus
            .publish(topics::SKILL_RESPONSE, no_corr_id.as_object().cloned().unwrap())
            .await;
        assert!(report.all_completed());

        assert!(speech.is_empty());
    }

    #[tokio::test]
    async fn test_response_becomes_speech() {
        let bus = EventBus::new();
        let speech = Recorder::attach(&bus, topics::TTS_REQUEST).await;
        let _router = Router::attach(&bus).await;

        let response = SkillResponse::new("weather", Some("It's sunny".to_string()));
        bus.publish_contract(&response).await.unwrap();

        let published: Vec<SpeechRequest> = speech.decoded();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].text, "It's sunny");
        assert_eq!(published[0].corr_id(), response.corr_id());
    }

    #[tokio::test]
    async fn test_empty_say_is_dropped() {
        let bus = EventBus::new();
        let speech = Recorder::attach(&bus, topics::TTS_REQUEST).await;
        let _router = Router::attach(&bus).await;

        bus.publish_contract(&SkillResponse::new("weather", Some(String::new())))
            .await
            .unwrap();
        bus.publish_contract(&SkillResponse::new("weather", None))
            .await
            .unwrap();

        assert!(speech.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_router_stops_routing() {
        let bus = EventBus::new();
        let requests = Recorder::attach(&bus, topics::SKILL_REQUEST).await;
        let router = Router::attach(&bus).await;
        drop(router);

        bus.publish_contract(&weather_intent()).await.unwrap();

        assert!(requests.is_empty());
    }
}
