use std::fmt;
use url::Url;

/// Pool partition key: `(scheme, host, port)` with the scheme's default port
/// filled in, so `http://a.com/x` and `http://a.com:80/y` share connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl RouteKey {
    /// Returns `None` for URLs without a host or a known port (e.g. `mailto:`).
    pub fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default()?,
        })
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
