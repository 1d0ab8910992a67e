use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::AuthCredential;
use crate::pool::PoolLimits;
use crate::reaper::ReaperPolicy;

const REDACTED: &str = "<redacted>";

/// Forward proxy every request is routed through.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fetcher configuration loaded from `~/.config/pagefetch/config.toml`.
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Abort a transfer when no data arrives for this long.
    pub socket_timeout_ms: u64,
    /// Connection setup timeout; also bounds the wait for a free pooled connection.
    pub connect_timeout_ms: u64,
    /// Minimum spacing between the starts of two requests.
    pub politeness_delay_ms: u64,
    /// Largest entity (in bytes) a fetch will accept.
    pub max_download_size: u64,
    pub user_agent: String,
    /// Register the https transport. When false, https URLs fail at dispatch.
    pub include_https_pages: bool,
    /// INSECURE: accept any certificate chain and skip hostname verification.
    /// Only meant for crawling hosts with broken certificates you already trust.
    pub insecure_tls: bool,
    /// Custom CA bundle used instead of the system trust store.
    pub ca_bundle: Option<PathBuf>,
    /// Maximum pooled connections across all hosts.
    pub max_total_connections: usize,
    /// Maximum pooled connections per (scheme, host, port).
    pub max_connections_per_host: usize,
    /// Idle pooled connections older than this are closed by the reaper.
    pub idle_timeout_secs: u64,
    /// Connections are closed after this long regardless of use.
    pub max_connection_lifetime_secs: u64,
    /// How often the reaper sweeps the pool.
    pub reaper_interval_secs: u64,
    pub proxy: Option<ProxyConfig>,
    /// Logins performed once when the fetcher starts, in order.
    pub auth: Vec<AuthCredential>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            socket_timeout_ms: 20_000,
            connect_timeout_ms: 30_000,
            politeness_delay_ms: 200,
            max_download_size: 1_048_576,
            user_agent: concat!("pagefetch/", env!("CARGO_PKG_VERSION")).to_string(),
            include_https_pages: true,
            insecure_tls: false,
            ca_bundle: None,
            max_total_connections: 100,
            max_connections_per_host: 100,
            idle_timeout_secs: 30,
            max_connection_lifetime_secs: 300,
            reaper_interval_secs: 5,
            proxy: None,
            auth: Vec::new(),
        }
    }
}

impl FetchConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn max_connection_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_connection_lifetime_secs)
    }

    /// Pool caps; zero caps are clamped to one connection.
    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            max_total: self.max_total_connections.max(1),
            max_per_route: self.max_connections_per_host.max(1),
            connect_timeout: self.connect_timeout(),
            socket_timeout: self.socket_timeout(),
        }
    }

    /// Copy safe to print: proxy and login passwords are masked.
    pub fn redacted(&self) -> FetchConfig {
        let mut cfg = self.clone();
        if let Some(proxy) = cfg.proxy.as_mut() {
            if proxy.password.is_some() {
                proxy.password = Some(REDACTED.to_string());
            }
        }
        for credential in &mut cfg.auth {
            match credential {
                AuthCredential::Basic(c) => c.password = REDACTED.to_string(),
                AuthCredential::Form(c) => c.password = REDACTED.to_string(),
            }
        }
        cfg
    }

    pub fn reaper_policy(&self) -> ReaperPolicy {
        ReaperPolicy {
            interval: Duration::from_secs(self.reaper_interval_secs.max(1)),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pagefetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<FetchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: FetchConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
