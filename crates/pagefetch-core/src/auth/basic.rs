use super::{Login, LoginError};
use crate::cancel::CancelToken;
use crate::client::{AuthScope, Credentials, HttpClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// HTTP basic credentials presented to every request for `host:port`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredential {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredential")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Login for BasicCredential {
    fn apply(&self, client: &HttpClient, _cancel: &CancelToken) -> Result<(), LoginError> {
        let replaced = client.credentials().set(
            AuthScope::new(&self.host, self.port),
            Credentials {
                username: self.username.clone(),
                password: self.password.clone(),
            },
        );
        if replaced.is_some() {
            debug!(host = %self.host, port = self.port, "basic credentials replace an earlier entry");
        }
        Ok(())
    }
}
