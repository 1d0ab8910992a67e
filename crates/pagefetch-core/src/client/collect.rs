//! Response capture for one transfer on a pooled handle.
//!
//! The collector is the `Handler` of every pooled `Easy2`. It records the
//! status line and headers of the final response, buffers the body within the
//! size limit, and decides at the end of the header block whether the body is
//! worth reading at all.

use crate::cancel::CancelToken;
use crate::fetch::{classify_status, StatusClass};
use curl::easy::{Handler, WriteError};

/// How the body of the current transfer is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ReadMode {
    /// Page fetch: stop before the body on redirects and on 200 responses that
    /// declare more than `max_size` bytes; cut any other body off at `max_size`.
    Page { max_size: u64 },
    /// Read and drop the body (login responses).
    #[default]
    Discard,
}

/// Why a transfer ended before the response was fully read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    Redirect,
    /// 200 response with a declared length over the limit.
    Oversized(u64),
    /// Body reached the size limit without a declared length.
    Truncated,
    Cancelled,
}

/// Status and headers of the final response, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    fn from_status_line(line: &str) -> Self {
        let status = line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }
}

#[derive(Default)]
pub struct Collector {
    mode: ReadMode,
    head: ResponseHead,
    body: Vec<u8>,
    stop: Option<Stop>,
    cancel: Option<CancelToken>,
}

impl Collector {
    /// Clears state left by the previous transfer on this handle.
    pub(crate) fn begin(&mut self, mode: ReadMode, cancel: CancelToken) {
        *self = Collector {
            mode,
            cancel: Some(cancel),
            ..Collector::default()
        };
    }

    /// Hands out what was captured and resets the collector.
    pub(crate) fn finish(&mut self) -> (ResponseHead, Vec<u8>, Option<Stop>) {
        let done = std::mem::take(self);
        (done.head, done.body, done.stop)
    }

    /// Called on the blank line ending a header block. Returning false aborts
    /// the transfer before any body byte is read.
    fn on_head_complete(&mut self) -> bool {
        // Interim 1xx responses are followed by the real one.
        if (100..200).contains(&self.head.status) {
            return true;
        }
        let ReadMode::Page { max_size } = self.mode else {
            return true;
        };
        match classify_status(self.head.status) {
            StatusClass::Redirect => {
                self.stop = Some(Stop::Redirect);
                false
            }
            StatusClass::Ok => match self.head.content_length() {
                Some(size) if size > max_size => {
                    self.stop = Some(Stop::Oversized(size));
                    false
                }
                _ => true,
            },
            StatusClass::Other => true,
        }
    }
}

impl Handler for Collector {
    fn header(&mut self, data: &[u8]) -> bool {
        let line = String::from_utf8_lossy(data);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.starts_with("HTTP/") {
            self.head = ResponseHead::from_status_line(line);
            return true;
        }
        if line.is_empty() {
            return self.on_head_complete();
        }
        if let Some((name, value)) = line.split_once(':') {
            self.head
                .headers
                .push((name.trim().to_string(), value.trim().to_string()));
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        let max_size = match self.mode {
            ReadMode::Discard => return Ok(data.len()),
            ReadMode::Page { max_size } => max_size,
        };
        let room = max_size.saturating_sub(self.body.len() as u64);
        let room = usize::try_from(room).unwrap_or(usize::MAX);
        if data.len() > room {
            self.body.extend_from_slice(data.get(..room).unwrap_or_default());
            self.stop = Some(Stop::Truncated);
            return Ok(0); // abort transfer
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                self.stop = Some(Stop::Cancelled);
                false
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(collector: &mut Collector, lines: &[&str]) -> Vec<bool> {
        lines
            .iter()
            .map(|line| collector.header(format!("{line}\r\n").as_bytes()))
            .collect()
    }

    fn page_collector(max_size: u64) -> Collector {
        let mut collector = Collector::default();
        collector.begin(ReadMode::Page { max_size }, CancelToken::new());
        collector
    }

    #[test]
    fn headers_are_kept_in_order() {
        let mut c = page_collector(1024);
        feed(&mut c, &["HTTP/1.1 200 OK", "Content-Type: text/html", "X-A: 1", "x-a: 2", ""]);
        let (head, _, stop) = c.finish();
        assert_eq!(head.status, 200);
        assert_eq!(head.headers.len(), 3);
        assert_eq!(head.header("X-A"), Some("1"));
        assert_eq!(head.header("content-type"), Some("text/html"));
        assert!(stop.is_none());
    }

    #[test]
    fn interim_response_is_replaced() {
        let mut c = page_collector(1024);
        let verdicts = feed(
            &mut c,
            &["HTTP/1.1 100 Continue", "", "HTTP/1.1 404 Not Found", "Server: x", ""],
        );
        assert!(verdicts.iter().all(|v| *v));
        let (head, _, _) = c.finish();
        assert_eq!(head.status, 404);
        assert_eq!(head.headers, vec![("Server".to_string(), "x".to_string())]);
    }

    #[test]
    fn redirect_stops_before_body() {
        let mut c = page_collector(1024);
        let verdicts = feed(&mut c, &["HTTP/1.1 301 Moved Permanently", "Location: /b", ""]);
        assert_eq!(verdicts.last(), Some(&false));
        let (head, _, stop) = c.finish();
        assert_eq!(head.header("location"), Some("/b"));
        assert_eq!(stop, Some(Stop::Redirect));
    }

    #[test]
    fn declared_oversize_stops_before_body() {
        let mut c = page_collector(100);
        let verdicts = feed(&mut c, &["HTTP/2 200", "content-length: 101", ""]);
        assert_eq!(verdicts.last(), Some(&false));
        assert_eq!(c.finish().2, Some(Stop::Oversized(101)));
    }

    #[test]
    fn oversize_rule_only_applies_to_200() {
        let mut c = page_collector(100);
        let verdicts = feed(&mut c, &["HTTP/1.1 404 Not Found", "Content-Length: 5000", ""]);
        assert!(verdicts.iter().all(|v| *v));
    }

    #[test]
    fn unknown_length_body_is_truncated_at_limit() {
        let mut c = page_collector(10);
        feed(&mut c, &["HTTP/1.1 200 OK", ""]);
        assert_eq!(c.write(b"0123456").unwrap(), 7);
        assert_eq!(c.write(b"789abc").unwrap(), 0);
        let (_, body, stop) = c.finish();
        assert_eq!(body, b"0123456789");
        assert_eq!(stop, Some(Stop::Truncated));
    }

    #[test]
    fn body_exactly_at_limit_is_complete() {
        let mut c = page_collector(4);
        assert_eq!(c.write(b"abcd").unwrap(), 4);
        let (_, body, stop) = c.finish();
        assert_eq!(body, b"abcd");
        assert!(stop.is_none());
    }

    #[test]
    fn discard_mode_drops_body() {
        let mut c = Collector::default();
        c.begin(ReadMode::Discard, CancelToken::new());
        feed(&mut c, &["HTTP/1.1 302 Found", "Location: /home", ""]);
        assert_eq!(c.write(b"whatever").unwrap(), 8);
        let (head, body, stop) = c.finish();
        assert_eq!(head.status, 302);
        assert!(body.is_empty());
        assert!(stop.is_none());
    }

    #[test]
    fn progress_aborts_when_cancelled() {
        let token = CancelToken::new();
        let mut c = Collector::default();
        c.begin(ReadMode::Page { max_size: 10 }, token.clone());
        assert!(c.progress(0.0, 0.0, 0.0, 0.0));
        token.cancel();
        assert!(!c.progress(0.0, 0.0, 0.0, 0.0));
        assert_eq!(c.finish().2, Some(Stop::Cancelled));
    }
}
