use thiserror::Error;

/// Startup-level failures. This is deliberately small: each subsystem
/// (KV, store, search, LLM, availability) carries its own error enum and
/// degrades internally instead of propagating, so the only error allowed
/// to stop the process is a broken configuration.
#[derive(Debug, Error)]
pub enum OficioError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, OficioError>;
