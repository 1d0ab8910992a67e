//! Login flows run once while a fetcher starts.
//!
//! Credentials are applied in list order. Basic credentials go into the
//! client's shared provider; form credentials perform one POST whose session
//! cookies end up in the client's jar. A failed login is logged and the
//! fetcher carries on without that session.

mod basic;
mod form;

pub use basic::BasicCredential;
pub use form::FormCredential;

use crate::cancel::CancelToken;
use crate::client::HttpClient;
use crate::fetch::FetchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid login URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("login rejected with status {status}")]
    Rejected { status: u16 },
    #[error(transparent)]
    Transfer(#[from] FetchError),
}

/// A login flow applied against the shared client.
pub trait Login {
    fn apply(&self, client: &HttpClient, cancel: &CancelToken) -> Result<(), LoginError>;
}

/// One configured credential (`type = "basic"` or `type = "form"` in TOML).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthCredential {
    Basic(BasicCredential),
    Form(FormCredential),
}

impl AuthCredential {
    pub fn host(&self) -> &str {
        match self {
            AuthCredential::Basic(c) => &c.host,
            AuthCredential::Form(c) => &c.host,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AuthCredential::Basic(_) => "basic",
            AuthCredential::Form(_) => "form",
        }
    }
}

impl Login for AuthCredential {
    fn apply(&self, client: &HttpClient, cancel: &CancelToken) -> Result<(), LoginError> {
        match self {
            AuthCredential::Basic(c) => c.apply(client, cancel),
            AuthCredential::Form(c) => c.apply(client, cancel),
        }
    }
}

pub struct Authenticator<'c> {
    client: &'c HttpClient,
}

impl<'c> Authenticator<'c> {
    pub fn new(client: &'c HttpClient) -> Self {
        Self { client }
    }

    /// Applies every credential in order. Returns how many succeeded; failures
    /// are logged and skipped.
    pub fn apply_all(&self, credentials: &[AuthCredential], cancel: &CancelToken) -> usize {
        let mut applied = 0;
        for credential in credentials {
            if cancel.is_cancelled() {
                warn!("authentication cut short by shutdown");
                break;
            }
            let host = credential.host();
            let kind = credential.kind();
            match credential.apply(self.client, cancel) {
                Ok(()) => {
                    debug!(host, kind, "login applied");
                    applied += 1;
                }
                Err(err @ LoginError::Rejected { .. }) => {
                    warn!(host, kind, error = %err, "login rejected; continuing unauthenticated");
                }
                Err(err) => {
                    error!(host, kind, error = %err, "login failed; continuing unauthenticated");
                }
            }
        }
        applied
    }
}
