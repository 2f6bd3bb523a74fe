//! # Fish Router
//!
//! Maps classified intents to skills and skill answers to speech.
//!
//! ## Routing Rules
//!
//! - An intent is routed to the skill registered for its label, or to a skill
//!   with the same name as the label when nothing is registered.
//! - An intent that resolves to an empty skill name is dropped.
//! - A skill response is spoken only when its `say` field is present and
//!   non-empty.
//! - Malformed events are dropped; the router never fails on bad input.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fish_events::EventBus;
//! use fish_router::Router;
//!
//! async fn example() {
//!     let bus = EventBus::new();
//!     let router = Router::attach(&bus).await;
//!
//!     router.register_route("weather", "weatherbot").await;
//! }
//! ```

pub mod router;

pub use router::Router;
