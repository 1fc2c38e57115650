//! Key/value access for the broker: Redis when reachable, an in-process map
//! when not. Callers never see a storage error — degraded reads return
//! nothing, degraded writes are logged and dropped (or land in the fallback).

pub mod client;
pub mod keys;

pub use client::KvClient;
