//! Error taxonomy for the supply pipeline
//!
//! Startup and configuration paths use `anyhow`; everything between the
//! upstream provider and the HTTP boundary returns [`SupplyError`].

use thiserror::Error;

pub type SupplyResult<T> = Result<T, SupplyError>;

#[derive(Error, Debug, Clone)]
pub enum SupplyError {
    /// Transport failure, timeout or non-success status from the provider
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Body could not be turned into a base-unit integer
    #[error("upstream returned malformed data: {0}")]
    UpstreamMalformed(String),

    /// The cache entry was missing or expired and the refresh failed
    #[error("supply refresh failed: {0}")]
    RefreshFailed(#[source] Box<SupplyError>),
}

impl SupplyError {
    /// The upstream failure underneath any cache wrapping.
    pub fn root(&self) -> &SupplyError {
        match self {
            SupplyError::RefreshFailed(inner) => inner.root(),
            other => other,
        }
    }
}
