/// Which exit of the response state machine produced a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 200. `url` is the URL that actually served the page: the requested one,
    /// or the client's final request URI when that differs canonically.
    Fetched { url: String },
    /// Redirect status. `moved_to` is absent when there was no `Location`
    /// header or it could not be resolved.
    Redirect { moved_to: Option<String> },
    /// Any other status, left for the caller to interpret.
    Other,
}

/// Response body captured within the size limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub body: Vec<u8>,
    /// `Content-Length` as declared by the server.
    pub declared_length: Option<u64>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    /// Set when no length was declared and the body was cut off at the limit.
    pub truncated: bool,
}

impl Entity {
    /// Builds the entity, or `None` for an empty body with no positive declared length.
    pub fn from_parts(
        body: Vec<u8>,
        declared_length: Option<u64>,
        content_type: Option<String>,
        content_encoding: Option<String>,
        truncated: bool,
    ) -> Option<Self> {
        if body.is_empty() && declared_length.unwrap_or(0) == 0 {
            return None;
        }
        Some(Self {
            body,
            declared_length,
            content_type,
            content_encoding,
            truncated,
        })
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// `charset` parameter of the content type, lowercased.
    pub fn charset(&self) -> Option<String> {
        self.content_type.as_deref()?.split(';').skip(1).find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub status_code: u16,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    pub outcome: Outcome,
    pub entity: Option<Entity>,
}

impl FetchResult {
    pub fn fetched_url(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Fetched { url } => Some(url),
            _ => None,
        }
    }

    pub fn moved_to_url(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Redirect { moved_to } => moved_to.as_deref(),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.outcome, Outcome::Redirect { .. })
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
