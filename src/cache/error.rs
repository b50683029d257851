use thiserror::Error;

/// Failures talking to the cache medium. These never reach HTTP callers.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend `{backend}` unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },
    #[error("cache backend `{backend}` timed out during `{op}`")]
    Timeout {
        backend: &'static str,
        op: &'static str,
    },
    #[error("invalid cache url: {0}")]
    InvalidUrl(String),
}

impl CacheError {
    pub fn unavailable(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            backend,
            message: err.to_string(),
        }
    }
}
