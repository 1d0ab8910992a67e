/// Coarse classification of a final response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 200: the page was served.
    Ok,
    /// 300, 301, 302, 303, 307, 308: the page moved.
    Redirect,
    Other,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Ok => "ok",
            StatusClass::Redirect => "redirect",
            StatusClass::Other => "other",
        }
    }
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200 => StatusClass::Ok,
        300 | 301 | 302 | 303 | 307 | 308 => StatusClass::Redirect,
        _ => StatusClass::Other,
    }
}
