use crate::cancel::Interrupted;
use thiserror::Error;

/// Why a single fetch could not produce a result.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// No transport is registered for the scheme (https disabled or TLS setup failed).
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("fetch interrupted")]
    Interrupted,

    #[error("entity of {size} bytes exceeds the {max}-byte limit")]
    Oversized { size: u64, max: u64 },

    #[error("no pooled connection to {route} became available in time")]
    PoolTimeout { route: String },

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("transfer failed: {0}")]
    Io(#[from] curl::Error),
}

impl FetchError {
    /// True when the fetch stopped because it was cancelled (usually shutdown),
    /// not because the network failed.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, FetchError::Interrupted)
    }
}

impl From<Interrupted> for FetchError {
    fn from(_: Interrupted) -> Self {
        FetchError::Interrupted
    }
}
