use thiserror::Error;

/// Error taxonomy for the pipeline (§7). Each variant wraps a short detail
/// string rather than the underlying error type, so callers across crate
/// boundaries don't need to depend on every transport/parsing crate.
#[derive(Error, Debug, Clone)]
pub enum IntelError {
    #[error("policy blocked: {0}")]
    PolicyBlocked(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream degraded: {0}")]
    UpstreamDegraded(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("repository error: {0}")]
    Repository(String),
}

impl IntelError {
    /// Transport failures are retried by the ingestion worker; everything
    /// else is terminal for that attempt.
    pub fn retryable(&self) -> bool {
        matches!(self, IntelError::TransportFailure(_))
    }
}

/// Narrower error returned by individual `Provider::fetch_company_data`
/// calls. Converted to `IntelError` at the dispatch boundary so one
/// provider's failure never propagates past its own `ProviderResult`.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("not configured")]
    NotConfigured,

    #[error("rate limited")]
    RateLimited,

    #[error("transport: {0}")]
    Transport(String),

    #[error("parse: {0}")]
    Parse(String),
}

impl From<ProviderError> for IntelError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotConfigured => IntelError::UpstreamDegraded("not configured".into()),
            ProviderError::RateLimited => IntelError::Throttled("rate limited".into()),
            ProviderError::Transport(msg) => IntelError::TransportFailure(msg),
            ProviderError::Parse(msg) => IntelError::ParseFailure(msg),
        }
    }
}

pub type IntelResult<T> = Result<T, IntelError>;
