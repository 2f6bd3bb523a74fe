//! Event bus configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an [`EventBus`](crate::EventBus).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// How long `publish` waits for a single subscriber before detaching it.
    ///
    /// `None` waits indefinitely: a hanging subscriber stalls the publisher.
    /// A detached subscriber keeps running in the background.
    pub subscriber_timeout_ms: Option<u64>,
}

impl BusConfig {
    /// Configuration that detaches subscribers after `timeout`.
    pub fn with_subscriber_timeout(timeout: Duration) -> Self {
        Self {
            subscriber_timeout_ms: Some(timeout.as_millis() as u64),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FISH_SUBSCRIBER_TIMEOUT_MS`: per-subscriber timeout (unset or `0` disables it)
    pub fn from_env() -> Self {
        Self {
            subscriber_timeout_ms: std::env::var("FISH_SUBSCRIBER_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ms| *ms > 0),
        }
    }

    /// The subscriber timeout as a Duration.
    pub fn subscriber_timeout(&self) -> Option<Duration> {
        self.subscriber_timeout_ms.map(Duration::from_millis)
    }
}
