//! HTTP exchange over a leased pooled connection.
//!
//! `HttpClient` owns the pieces every request shares: the connection pool,
//! the transfer settings, basic-auth credentials and the session cookie jar.
//! Redirects are never followed here; the fetch pipeline reports them.

mod collect;
mod cookies;
mod credentials;
mod settings;
mod tls;

pub use collect::{Collector, ResponseHead};
pub(crate) use collect::{ReadMode, Stop};
pub use cookies::SessionCookies;
pub use credentials::{AuthScope, Credentials, CredentialsProvider};
pub use settings::ClientSettings;
pub use tls::{TlsSettings, TlsSetupError, Transports};

use crate::cancel::CancelToken;
use crate::fetch::FetchError;
use crate::pool::{ConnectionPool, Lease, PooledConnection, RouteKey};
use curl::easy::List;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub(crate) enum Method {
    Get,
    /// Form POST with an already urlencoded body.
    PostForm(String),
}

pub(crate) struct Request<'u> {
    pub(crate) url: &'u Url,
    pub(crate) method: Method,
}

impl<'u> Request<'u> {
    pub(crate) fn get(url: &'u Url) -> Self {
        Self {
            url,
            method: Method::Get,
        }
    }

    pub(crate) fn post_form(url: &'u Url, body: String) -> Self {
        Self {
            url,
            method: Method::PostForm(body),
        }
    }
}

/// A finished transfer that still holds its connection. The caller decides
/// whether the connection goes back to the pool or is closed.
pub(crate) struct Exchange<'c> {
    pub(crate) lease: Lease<'c>,
    pub(crate) head: ResponseHead,
    pub(crate) body: Vec<u8>,
    pub(crate) stop: Option<Stop>,
    pub(crate) effective_url: Option<String>,
}

impl Exchange<'_> {
    /// Returns the connection for reuse when the response was read to its
    /// end, and closes it otherwise.
    pub(crate) fn finish(self) {
        if self.stop.is_none() {
            self.lease.release();
        } else {
            self.lease.abort();
        }
    }
}

pub struct HttpClient {
    pool: Arc<ConnectionPool>,
    settings: ClientSettings,
    credentials: CredentialsProvider,
    cookies: SessionCookies,
}

impl HttpClient {
    pub fn new(pool: Arc<ConnectionPool>, settings: ClientSettings) -> Self {
        Self {
            pool,
            settings,
            credentials: CredentialsProvider::default(),
            cookies: SessionCookies::default(),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &CredentialsProvider {
        &self.credentials
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// The pool route for `url`, or `UnsupportedScheme` when no enabled
    /// transport serves it.
    pub(crate) fn route_for(&self, url: &Url) -> Result<RouteKey, FetchError> {
        if !self.settings.transports.supports(url.scheme()) {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }
        RouteKey::from_url(url).ok_or_else(|| FetchError::UnsupportedScheme(url.scheme().to_string()))
    }

    pub(crate) fn execute(
        &self,
        request: &Request<'_>,
        mode: ReadMode,
        cancel: &CancelToken,
    ) -> Result<Exchange<'_>, FetchError> {
        let route = self.route_for(request.url)?;
        let mut lease = self.pool.lease(&route, cancel)?;
        let conn = lease.connection_mut();
        self.prepare(conn, &route, request)?;
        conn.easy.get_mut().begin(mode, cancel.clone());
        let performed = conn.easy.perform();
        let (head, body, stop) = conn.easy.get_mut().finish();
        match (performed, stop) {
            (_, Some(Stop::Cancelled)) => return Err(FetchError::Interrupted),
            (Err(err), None) => return Err(FetchError::Io(err)),
            _ => {}
        }

        let effective_url = conn.easy.effective_url().ok().flatten().map(str::to_owned);
        if head.header("set-cookie").is_some() {
            match self.cookies.absorb(&mut conn.easy, &mut conn.cookie_generation) {
                Ok(0) => {}
                Ok(changed) => debug!(%route, changed, "session cookies updated"),
                Err(err) => warn!(%route, error = %err, "could not read cookies from response"),
            }
        }

        Ok(Exchange {
            lease,
            head,
            body,
            stop,
            effective_url,
        })
    }

    fn prepare(&self, conn: &mut PooledConnection, route: &RouteKey, request: &Request<'_>) -> Result<(), curl::Error> {
        let easy = &mut conn.easy;
        easy.reset();
        self.settings.apply(easy, route)?;
        self.credentials.apply_to(easy, route)?;
        self.cookies.import_into(easy, &mut conn.cookie_generation)?;
        easy.url(request.url.as_str())?;
        match &request.method {
            Method::Get => easy.get(true)?,
            Method::PostForm(body) => {
                easy.post(true)?;
                easy.post_fields_copy(body.as_bytes())?;
                let mut headers = List::new();
                headers.append("Content-Type: application/x-www-form-urlencoded")?;
                headers.append("Expect:")?;
                easy.http_headers(headers)?;
            }
        }
        easy.progress(true)?;
        Ok(())
    }
}
