use super::tls::Transports;
use super::Collector;
use crate::config::{FetchConfig, ProxyConfig};
use crate::pool::RouteKey;
use curl::easy::Easy2;
use std::time::Duration;

/// Per-request transfer options shared by every pooled handle.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// A transfer is aborted when no byte arrives for this long.
    pub socket_timeout: Duration,
    pub proxy: Option<ProxyConfig>,
    pub transports: Transports,
}

impl ClientSettings {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            socket_timeout: config.socket_timeout(),
            proxy: config.proxy.clone(),
            transports: Transports::register(
                config.include_https_pages,
                config.insecure_tls,
                config.ca_bundle.clone(),
            ),
        }
    }

    /// Applies the options to a freshly reset handle.
    pub(crate) fn apply(&self, easy: &mut Easy2<Collector>, route: &RouteKey) -> Result<(), curl::Error> {
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(self.connect_timeout)?;
        // curl has no plain read timeout; "under 1 byte/s for N seconds" is the same rule.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(self.socket_timeout.max(Duration::from_secs(1)))?;
        easy.follow_location(false)?;
        easy.max_connects(1)?;
        easy.cookie_file("")?;
        if route.scheme == "https" {
            if let Some(tls) = self.transports.tls() {
                tls.apply(easy)?;
            }
        }
        match &self.proxy {
            Some(proxy) => apply_proxy(easy, proxy)?,
            // Only the configured proxy is used, never one from the environment.
            None => easy.proxy("")?,
        }
        Ok(())
    }
}

fn apply_proxy(easy: &mut Easy2<Collector>, proxy: &ProxyConfig) -> Result<(), curl::Error> {
    easy.proxy(&format!("{}:{}", proxy.host, proxy.port))?;
    easy.proxy_port(proxy.port)?;
    if let Some(username) = &proxy.username {
        easy.proxy_username(username)?;
        easy.proxy_password(proxy.password.as_deref().unwrap_or(""))?;
    }
    Ok(())
}
