//! Real-time provider availability over MQTT (C9).
//!
//! One request topic, one response topic. A request scatters a candidate set
//! to the provider pool; replies gather into a KV-backed state record until
//! the deadline — shortened to a small grace window once the first accept
//! lands. Everything returned to the caller preserves the original candidate
//! order; reply order is never trusted.

pub mod coordinator;
pub mod state;
pub mod wire;

pub use coordinator::{
    AvailabilityCoordinator, AvailabilityOutcome, AvailabilityQuery, PendingAvailability,
};
pub use state::AvailabilityState;
