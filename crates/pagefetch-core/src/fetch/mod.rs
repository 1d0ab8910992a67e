//! Page fetch pipeline.
//!
//! `PageFetcher` is shared by crawl workers. Every call waits for the
//! politeness gate, issues one GET over a pooled connection, then classifies
//! the response:
//!
//! - redirect statuses report the resolved `Location` and never read the body;
//! - 200 reports the URL that served the page, fails with
//!   [`FetchError::Oversized`] when the declared length is over the limit, and
//!   otherwise captures the body up to the limit;
//! - anything else is returned as is.
//!
//! A connection goes back to the pool only when its response was read to the
//! end and produced an entity; every other exit closes it.

mod classify;
mod error;
mod result;

pub use classify::{classify_status, StatusClass};
pub use error::FetchError;
pub use result::{Entity, FetchResult, Outcome};

use crate::auth::Authenticator;
use crate::cancel::CancelToken;
use crate::canonical;
use crate::client::{ClientSettings, Exchange, HttpClient, ReadMode, Request, Stop};
use crate::clock::{Clock, SystemClock};
use crate::config::FetchConfig;
use crate::politeness::PolitenessGate;
use crate::pool::{ConnectionPool, PoolStats};
use crate::reaper::IdleConnectionReaper;
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

pub struct PageFetcher {
    client: HttpClient,
    gate: PolitenessGate,
    max_download_size: u64,
    shutdown: CancelToken,
    reaper: Mutex<Option<IdleConnectionReaper>>,
}

impl PageFetcher {
    /// Builds the pool and client, runs the configured logins and starts the
    /// reaper. Login and TLS problems are logged, not returned.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &FetchConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::new(
            config.pool_limits(),
            config.max_connection_lifetime(),
            Arc::clone(&clock),
        ));
        let client = HttpClient::new(Arc::clone(&pool), ClientSettings::from_config(config));
        if let Some(proxy) = &config.proxy {
            debug!(host = %proxy.host, port = proxy.port, "routing requests through proxy");
        }

        let shutdown = CancelToken::new();
        if !config.auth.is_empty() {
            let applied = Authenticator::new(&client).apply_all(&config.auth, &shutdown);
            info!(applied, configured = config.auth.len(), "authentication finished");
        }

        let reaper = IdleConnectionReaper::start(pool, config.reaper_policy(), &shutdown)
            .context("failed to start idle connection reaper")?;

        Ok(Self {
            client,
            gate: PolitenessGate::new(config.politeness_delay(), clock),
            max_download_size: config.max_download_size,
            shutdown,
            reaper: Mutex::new(Some(reaper)),
        })
    }

    /// Fetches `url`, interrupted only by [`shutdown`](Self::shutdown).
    pub fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        self.fetch_with_cancel(url, &self.shutdown)
    }

    /// Fetches `url`, interrupted when `cancel` fires or the fetcher shuts
    /// down, whichever comes first. URLs no transport serves fail before the
    /// politeness wait.
    pub fn fetch_with_cancel(&self, url: &str, cancel: &CancelToken) -> Result<FetchResult, FetchError> {
        let target = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        self.client.route_for(&target)?;
        if self.shutdown.is_cancelled() {
            return Err(FetchError::Interrupted);
        }
        let cancel = {
            let either = self.shutdown.child();
            cancel.propagate_to(&either);
            either
        };

        self.gate.acquire(&cancel)?;
        debug!(url, "issuing request");
        let request = Request::get(&target);
        let mode = ReadMode::Page {
            max_size: self.max_download_size,
        };
        let exchange = self.client.execute(&request, mode, &cancel)?;
        self.classify(url, &target, exchange)
    }

    fn classify(&self, url: &str, target: &Url, exchange: Exchange<'_>) -> Result<FetchResult, FetchError> {
        let Exchange {
            lease,
            head,
            body,
            stop,
            effective_url,
        } = exchange;
        let status = head.status;

        let (outcome, entity) = match classify_status(status) {
            StatusClass::Redirect => {
                let moved_to = head.header("location").and_then(|location| {
                    canonical::resolve_against(location, target)
                        .map_err(|err| warn!(url, location, error = %err, "unusable redirect target"))
                        .ok()
                });
                (Outcome::Redirect { moved_to }, None)
            }
            StatusClass::Ok => {
                if let Some(Stop::Oversized(size)) = stop {
                    warn!(url, size, max = self.max_download_size, "entity too large; aborting");
                    lease.abort();
                    return Err(FetchError::Oversized {
                        size,
                        max: self.max_download_size,
                    });
                }
                let fetched = served_url(url, effective_url);
                let entity = Entity::from_parts(
                    body,
                    head.content_length(),
                    head.header("content-type").map(str::to_owned),
                    head.header("content-encoding").map(str::to_owned),
                    stop == Some(Stop::Truncated),
                );
                if let Some(entity) = entity.as_ref().filter(|e| e.truncated) {
                    debug!(url, size = entity.len(), "body without length cut off at limit");
                }
                (Outcome::Fetched { url: fetched }, entity)
            }
            StatusClass::Other => {
                let entity = Entity::from_parts(
                    body,
                    head.content_length(),
                    head.header("content-type").map(str::to_owned),
                    head.header("content-encoding").map(str::to_owned),
                    stop == Some(Stop::Truncated),
                );
                (Outcome::Other, entity)
            }
        };

        if entity.is_some() && stop.is_none() {
            lease.release();
        } else {
            lease.abort();
        }
        debug!(url, status, "fetch classified");
        Ok(FetchResult {
            status_code: status,
            headers: head.headers,
            outcome,
            entity,
        })
    }

    /// A child of the fetcher's shutdown token, for cancelling single fetches.
    pub fn cancel_token(&self) -> CancelToken {
        self.shutdown.child()
    }

    /// When the politeness gate last let a request through.
    pub fn last_issued(&self) -> Option<Instant> {
        self.gate.last_issued()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.client.pool().stats()
    }

    pub fn https_enabled(&self) -> bool {
        self.client.settings().transports.supports("https")
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Interrupts pending fetches, stops the reaper and closes the pool.
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let reaper = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut reaper) = reaper {
            reaper.stop();
            self.client.pool().close();
            info!("page fetcher shut down");
        }
    }
}

impl Drop for PageFetcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// URL to report for a 200: the requested one, unless the client ended up
/// somewhere whose canonical form differs from it.
fn served_url(requested: &str, effective: Option<String>) -> String {
    match effective {
        Some(effective) if effective != requested => match canonical::canonicalize(&effective) {
            Ok(canonical) if canonical == requested => requested.to_string(),
            _ => effective,
        },
        _ => requested.to_string(),
    }
}
