//! Canonical URLs and redirect resolution.
//!
//! A canonical URL is absolute http(s) with lowercase scheme and host, no
//! default port, no dot segments, no fragment, query parameters sorted by
//! name, and percent-escapes in one normal form. Two spellings of the same
//! resource canonicalize to the same string.

mod normalize;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalizeError {
    #[error("malformed URL {url:?}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("URL {0:?} has no host")]
    MissingHost(String),
}

/// Canonical form of an absolute URL.
pub fn canonicalize(url: &str) -> Result<String, CanonicalizeError> {
    let parsed = Url::parse(url.trim()).map_err(|source| CanonicalizeError::Malformed {
        url: url.to_string(),
        source,
    })?;
    normalize::normalize(parsed).map(String::from)
}

/// Resolves a `Location` header value against the URL that was requested and
/// returns the canonical absolute destination.
///
/// # Examples
///
/// - `resolve("page2.html", "http://example.com/dir/page1.html")` → `"http://example.com/dir/page2.html"`
/// - `resolve("/b", "http://example.com/a")` → `"http://example.com/b"`
pub fn resolve(location: &str, base: &str) -> Result<String, CanonicalizeError> {
    let base_url = Url::parse(base.trim()).map_err(|source| CanonicalizeError::Malformed {
        url: base.to_string(),
        source,
    })?;
    resolve_against(location, &base_url)
}

/// [`resolve`] with an already parsed base.
pub fn resolve_against(location: &str, base: &Url) -> Result<String, CanonicalizeError> {
    let joined = base
        .join(location.trim())
        .map_err(|source| CanonicalizeError::Malformed {
            url: location.to_string(),
            source,
        })?;
    normalize::normalize(joined).map(String::from)
}
