use thiserror::Error;

/// Engine error taxonomy. Every failure a workload can hit maps onto one of
/// these; nothing is dropped without a log line at the site that handles it.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required workload field is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown model id, provider spec, agent type, or session id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A vendor API call failed; the underlying cause is preserved.
    #[error("upstream failure: {0}")]
    Upstream(#[source] anyhow::Error),

    /// The datastore rejected a read or write.
    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl EngineError {
    pub fn upstream<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Upstream(err.into())
    }

    pub fn persistence<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Persistence(err.into())
    }
}
