//! Append-only per-phone conversation transcript, capped and TTL-bound.

pub mod log;

pub use log::{SessionLog, SessionStats, SessionTurn};
