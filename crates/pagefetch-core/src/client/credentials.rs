//! Credentials sent with HTTP basic authentication, keyed by host and port.

use super::Collector;
use crate::pool::RouteKey;
use curl::easy::{Auth, Easy2};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthScope {
    pub host: String,
    pub port: u16,
}

impl AuthScope {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            port,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Shared store consulted for every request. Registering a scope twice keeps
/// the later credentials.
#[derive(Debug, Default)]
pub struct CredentialsProvider {
    entries: RwLock<HashMap<AuthScope, Credentials>>,
}

impl CredentialsProvider {
    /// Stores `credentials` for `scope`, returning the ones they replace.
    pub fn set(&self, scope: AuthScope, credentials: Credentials) -> Option<Credentials> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope, credentials)
    }

    pub fn get(&self, scope: &AuthScope) -> Option<Credentials> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn apply_to(&self, easy: &mut Easy2<Collector>, route: &RouteKey) -> Result<(), curl::Error> {
        let Some(credentials) = self.get(&AuthScope::new(&route.host, route.port)) else {
            return Ok(());
        };
        easy.username(&credentials.username)?;
        easy.password(&credentials.password)?;
        let mut auth = Auth::new();
        auth.basic(true);
        easy.http_auth(&auth)
    }
}
