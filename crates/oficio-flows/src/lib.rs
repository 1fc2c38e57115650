//! Hot conversation state: the TTL-bound per-phone flow store and the
//! read-through profile cache.

pub mod profile_cache;
pub mod store;

pub use profile_cache::ProfileCache;
pub use store::FlowStore;
