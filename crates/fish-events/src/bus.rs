//! Event bus implementation
//!
//! This module provides the in-process publish/subscribe bus that decouples
//! the pipeline stages. Delivery of one publish fans out concurrently to every
//! subscriber of the topic; `publish` waits for those direct subscribers and
//! isolates their failures from each other and from the publisher.

use crate::config::BusConfig;
use crate::contracts::{Contract, ContractError, Payload};
use async_trait::async_trait;
use futures::future::join_all;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum BusError {
    /// Subscriber reported a failure
    #[error("Subscriber failed: {0}")]
    SubscriberFailed(String),

    /// Envelope could not be encoded or decoded
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Subscriber exceeded the configured timeout and was detached
    #[error("Subscriber timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Subscriber panicked
    #[error("Subscriber panicked: {0}")]
    Panicked(String),

    /// Subscriber could not be scheduled
    #[error("Failed to schedule subscriber: {0}")]
    Scheduling(String),
}

/// Result type for event bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// A unit of work invoked for every event published on a topic.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Handle one published payload.
    ///
    /// An `Err` (or a panic) is logged by the bus and never reaches the
    /// publisher or sibling subscribers.
    async fn handle(&self, payload: Payload) -> BusResult<()>;

    /// Name used in bus logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Subscriber wrapper for async closures.
pub struct FnSubscriber<F> {
    name: String,
    handler: F,
}

impl<F, Fut> FnSubscriber<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BusResult<()>> + Send + 'static,
{
    /// Create a new closure-based subscriber.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> Subscriber for FnSubscriber<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BusResult<()>> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> BusResult<()> {
        (self.handler)(payload).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a subscriber that calls into `component` without keeping it alive.
///
/// The bus never drops registrations, so components subscribe through a weak
/// reference: once the owner drops the component, deliveries become no-ops.
pub fn weak_subscriber<C, F, Fut>(
    name: impl Into<String>,
    component: &Arc<C>,
    handler: F,
) -> Arc<dyn Subscriber>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BusResult<()>> + Send + 'static,
{
    let component = Arc::downgrade(component);
    let name = name.into();
    let label = name.clone();

    Arc::new(FnSubscriber::new(name, move |payload| {
        let call = component.upgrade().map(|c| handler(c, payload));
        let label = label.clone();
        async move {
            match call {
                Some(fut) => fut.await,
                None => {
                    debug!(
                        target: "bus",
                        subscriber = %label,
                        "component dropped, skipping delivery"
                    );
                    Ok(())
                }
            }
        }
    }))
}

/// Event bus statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBusStats {
    /// Total publish calls
    pub events_published: u64,
    /// Subscriber invocations that completed successfully
    pub deliveries: u64,
    /// Subscriber invocations that returned an error or panicked
    pub subscriber_failures: u64,
    /// Publishes to topics without subscribers
    pub unrouted_events: u64,
    /// Subscriber invocations detached after the timeout
    pub detached_deliveries: u64,
    /// Registered subscribers across all topics
    pub registered_subscribers: usize,
}

/// Outcome of a single publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Topic that was published
    pub topic: String,
    /// Subscribers registered when the publish started
    pub subscribers: usize,
    /// Invocations that completed successfully
    pub completed: usize,
    /// Invocations that failed or could not be scheduled
    pub failed: usize,
    /// Invocations detached after the timeout
    pub detached: usize,
}

impl PublishReport {
    fn new(topic: &str, subscribers: usize) -> Self {
        Self {
            topic: topic.to_string(),
            subscribers,
            completed: 0,
            failed: 0,
            detached: 0,
        }
    }

    /// Whether every subscriber completed successfully.
    pub fn all_completed(&self) -> bool {
        self.completed == self.subscribers
    }
}

#[derive(Default)]
struct Counters {
    events_published: AtomicU64,
    deliveries: AtomicU64,
    subscriber_failures: AtomicU64,
    unrouted_events: AtomicU64,
    detached_deliveries: AtomicU64,
}

enum Delivery {
    Completed,
    Failed(BusError),
    Detached(BusError),
}

/// In-process event bus.
///
/// Cloning is cheap; clones share the same registry. Each pipeline owns its
/// own bus, there is no process-wide instance.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    /// Topic subscribers, in registration order
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>,
    /// Statistics
    stats: Counters,
    /// Bus configuration
    config: BusConfig,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus that waits indefinitely for subscribers.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with custom configuration.
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                stats: Counters::default(),
                config,
            }),
        }
    }

    /// Get the bus configuration.
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Register a subscriber for a topic.
    ///
    /// The same subscriber may be registered more than once and is then
    /// invoked once per registration. Registrations last for the lifetime of
    /// the bus.
    pub async fn subscribe(&self, topic: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        let topic = topic.into();
        let name = subscriber.name().to_string();

        let total = {
            let mut subscribers = self.inner.subscribers.write().await;
            let list = subscribers.entry(topic.clone()).or_default();
            list.push(subscriber);
            list.len()
        };

        info!(target: "bus", topic = %topic, subscriber = %name, total, "subscribe");
    }

    /// Register an async closure as a subscriber.
    pub async fn subscribe_fn<F, Fut>(
        &self,
        topic: impl Into<String>,
        name: impl Into<String>,
        handler: F,
    )
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BusResult<()>> + Send + 'static,
    {
        self.subscribe(topic, Arc::new(FnSubscriber::new(name, handler)))
            .await;
    }

    /// Number of subscribers currently registered for a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .await
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Drop every registration.
    ///
    /// Meant for test isolation, not for use while publishes are in flight.
    pub async fn clear(&self) {
        self.inner.subscribers.write().await.clear();
        debug!(target: "bus", "cleared all subscriptions");
    }

    /// Publish a payload to every subscriber of `topic`.
    ///
    /// The subscriber list is read once when the call starts; subscribers
    /// registered afterwards do not see this event. All invocations run
    /// concurrently and the call returns once each of them has completed,
    /// failed, or been detached by the subscriber timeout. Subscriber
    /// failures are logged and counted, never returned.
    pub async fn publish(&self, topic: &str, payload: Payload) -> PublishReport {
        let subscribers = {
            let registry = self.inner.subscribers.read().await;
            registry.get(topic).cloned().unwrap_or_default()
        };
        self.inner
            .stats
            .events_published
            .fetch_add(1, Ordering::Relaxed);

        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        info!(
            target: "bus",
            topic = %topic,
            subscribers = subscribers.len(),
            keys = ?keys,
            "publish"
        );

        let mut report = PublishReport::new(topic, subscribers.len());

        if subscribers.is_empty() {
            warn!(target: "bus", topic = %topic, "no subscribers for topic");
            self.inner
                .stats
                .unrouted_events
                .fetch_add(1, Ordering::Relaxed);
            return report;
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(target: "bus", topic = %topic, error = %e, "error scheduling subscribers");
                report.failed = subscribers.len();
                self.inner
                    .stats
                    .subscriber_failures
                    .fetch_add(subscribers.len() as u64, Ordering::Relaxed);
                return report;
            }
        };

        let timeout = self.inner.config.subscriber_timeout();

        let deliveries = subscribers.iter().enumerate().map(|(index, subscriber)| {
            let name = subscriber.name().to_string();
            debug!(
                target: "bus",
                topic = %topic,
                index,
                subscriber = %name,
                "scheduling subscriber"
            );

            let handle = runtime.spawn({
                let subscriber = subscriber.clone();
                let payload = payload.clone();
                async move { subscriber.handle(payload).await }
            });

            async move { (index, name, await_delivery(handle, timeout).await) }
        });

        for (index, name, delivery) in join_all(deliveries).await {
            match delivery {
                Delivery::Completed => report.completed += 1,
                Delivery::Failed(e) => {
                    report.failed += 1;
                    error!(
                        target: "bus",
                        topic = %topic,
                        index,
                        subscriber = %name,
                        error = %e,
                        "subscriber raised an error"
                    );
                }
                Delivery::Detached(e) => {
                    report.detached += 1;
                    warn!(
                        target: "bus",
                        topic = %topic,
                        index,
                        subscriber = %name,
                        error = %e,
                        "subscriber detached, still running in background"
                    );
                }
            }
        }

        let stats = &self.inner.stats;
        stats
            .deliveries
            .fetch_add(report.completed as u64, Ordering::Relaxed);
        stats
            .subscriber_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        stats
            .detached_deliveries
            .fetch_add(report.detached as u64, Ordering::Relaxed);

        report
    }

    /// Encode a contract and publish it on its topic.
    pub async fn publish_contract<C: Contract>(&self, event: &C) -> BusResult<PublishReport> {
        let payload = event.to_payload()?;
        Ok(self.publish(C::TOPIC, payload).await)
    }

    /// Get event bus stats.
    pub async fn stats(&self) -> EventBusStats {
        let registered_subscribers = self
            .inner
            .subscribers
            .read()
            .await
            .values()
            .map(Vec::len)
            .sum();
        let stats = &self.inner.stats;

        EventBusStats {
            events_published: stats.events_published.load(Ordering::Relaxed),
            deliveries: stats.deliveries.load(Ordering::Relaxed),
            subscriber_failures: stats.subscriber_failures.load(Ordering::Relaxed),
            unrouted_events: stats.unrouted_events.load(Ordering::Relaxed),
            detached_deliveries: stats.detached_deliveries.load(Ordering::Relaxed),
            registered_subscribers,
        }
    }
}

/// Wait for one scheduled invocation.
///
/// On timeout the join handle is dropped, which detaches the task instead of
/// cancelling it.
async fn await_delivery(handle: JoinHandle<BusResult<()>>, timeout: Option<Duration>) -> Delivery {
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                return Delivery::Detached(BusError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(Ok(())) => Delivery::Completed,
        Ok(Err(e)) => Delivery::Failed(e),
        Err(e) if e.is_panic() => {
            Delivery::Failed(BusError::Panicked(panic_message(e.into_panic())))
        }
        Err(e) => Delivery::Failed(BusError::Scheduling(e.to_string())),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
