use super::CanonicalizeError;
use url::Url;

pub(super) fn normalize(mut url: Url) -> Result<Url, CanonicalizeError> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(CanonicalizeError::UnsupportedScheme(other.to_string())),
    }
    let Some(host) = url.host_str() else {
        return Err(CanonicalizeError::MissingHost(url.to_string()));
    };
    if let Some(trimmed) = host.strip_suffix('.').filter(|h| !h.is_empty()) {
        let trimmed = trimmed.to_string();
        url.set_host(Some(&trimmed))
            .map_err(|source| CanonicalizeError::Malformed {
                url: url.to_string(),
                source,
            })?;
    }

    url.set_fragment(None);

    let path = normalize_escapes(url.path());
    if path != url.path() {
        // set_path also removes dot segments the decoding may have exposed.
        url.set_path(&path);
    }

    let query = url.query().map(sorted_query);
    match query {
        Some(q) if !q.is_empty() => url.set_query(Some(&q)),
        _ => url.set_query(None),
    }
    Ok(url)
}

/// Parameters sorted by name; values keep their relative order.
fn sorted_query(query: &str) -> String {
    let mut params: Vec<String> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(normalize_escapes)
        .collect();
    params.sort_by(|a, b| param_name(a).cmp(param_name(b)));
    params.join("&")
}

fn param_name(param: &str) -> &str {
    param.split_once('=').map_or(param, |(name, _)| name)
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Decodes escaped unreserved characters and uppercases the hex digits of
/// every other escape.
fn normalize_escapes(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escape = match bytes.get(i..i + 3) {
            Some([b'%', hi, lo]) => hex_value(*hi).zip(hex_value(*lo)).map(|(h, l)| h * 16 + l),
            _ => None,
        };
        match escape {
            Some(decoded) if is_unreserved(decoded) => {
                out.push(decoded);
                i += 3;
            }
            Some(decoded) => {
                out.extend_from_slice(format!("%{decoded:02X}").as_bytes());
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}

fn hex_value(b: u8) -> Option<u8> {
    char::from(b).to_digit(16).map(|d| d as u8)
}
