//! Assessment events
//!
//! The engine publishes an [`AssessmentEvent`] after every committed change
//! (creation, accepted verdict, escalation, finalization) and after every
//! rejected submission. Notification delivery lives outside this crate; it
//! subscribes to the [`EventBus`].

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventFilter, FilteredReceiver, SharedEventBus, DEFAULT_CHANNEL_CAPACITY};
pub use types::AssessmentEvent;
