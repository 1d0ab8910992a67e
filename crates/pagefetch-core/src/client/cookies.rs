//! Session cookies shared by every pooled handle.
//!
//! Each curl handle has its own cookie engine. Cookies a response sets are
//! copied into this jar, and a handle imports the jar again whenever its
//! generation moved since the handle last saw it. Lines use curl's Netscape
//! cookie-file format.
//!
//! A handle that was current when its request went out holds exactly the jar
//! plus whatever the response changed, so its list replaces the jar and
//! cookies the server deleted go away. A stale handle can only add or update.

use super::Collector;
use curl::easy::Easy2;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of a cookie: domain, path, name.
type CookieKey = (String, String, String);

#[derive(Debug, Default)]
struct Jar {
    cookies: Vec<(CookieKey, String)>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct SessionCookies {
    jar: Mutex<Jar>,
}

fn cookie_key(line: &str) -> Option<CookieKey> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, _, path, _, _, name, ..] = fields.as_slice() else {
        return None;
    };
    let domain = domain.strip_prefix("#HttpOnly_").unwrap_or(*domain);
    Some((domain.to_ascii_lowercase(), path.to_string(), name.to_string()))
}

/// True when the line carries an expiry at or before `now`. Session cookies
/// (expiry 0) never expire here.
fn is_expired(line: &str, now: u64) -> bool {
    match line.split('\t').nth(4).and_then(|field| field.parse::<u64>().ok()) {
        Some(0) | None => false,
        Some(expires) => expires <= now,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

impl SessionCookies {
    fn lock(&self) -> MutexGuard<'_, Jar> {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Merges Netscape-format lines into the jar; a cookie with the same
    /// domain, path and name replaces the stored one. Expired cookies are
    /// dropped. Returns how many cookies were added, changed or removed.
    pub fn merge<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> usize {
        let mut stale = u64::MAX;
        self.reconcile(lines, &mut stale, unix_now())
    }

    /// Applies a handle's cookie list to the jar. `seen` is the generation
    /// the handle held before its request; when it still matches the jar,
    /// cookies missing from the list were deleted by the server and are
    /// removed too, and `seen` advances to the new generation.
    fn reconcile<'a>(&self, lines: impl IntoIterator<Item = &'a str>, seen: &mut u64, now: u64) -> usize {
        let mut jar = self.lock();
        let current = *seen == jar.generation;
        let listed: Vec<(CookieKey, &str)> = lines
            .into_iter()
            .filter_map(|line| cookie_key(line).map(|key| (key, line)))
            .collect();

        let before = jar.cookies.len();
        jar.cookies.retain(|(key, line)| {
            !is_expired(line, now) && (!current || listed.iter().any(|(k, _)| k == key))
        });
        let mut changed = before - jar.cookies.len();

        for (key, line) in listed {
            if is_expired(line, now) {
                continue;
            }
            match jar.cookies.iter_mut().find(|(k, _)| *k == key) {
                Some((_, stored)) if stored == line => {}
                Some((_, stored)) => {
                    *stored = line.to_string();
                    changed += 1;
                }
                None => {
                    jar.cookies.push((key, line.to_string()));
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            jar.generation += 1;
        }
        if current {
            *seen = jar.generation;
        }
        changed
    }

    /// Copies the handle's cookies into the jar. `seen` is the handle's
    /// imported generation.
    pub(crate) fn absorb(&self, easy: &mut Easy2<Collector>, seen: &mut u64) -> Result<usize, curl::Error> {
        let list = easy.cookies()?;
        let lines: Vec<String> = list
            .iter()
            .filter_map(|raw| std::str::from_utf8(raw).ok())
            .map(str::to_owned)
            .collect();
        Ok(self.reconcile(lines.iter().map(String::as_str), seen, unix_now()))
    }

    /// Replaces the handle's cookies with the jar unless it already holds
    /// generation `seen`.
    pub(crate) fn import_into(&self, easy: &mut Easy2<Collector>, seen: &mut u64) -> Result<(), curl::Error> {
        let (generation, lines) = {
            let jar = self.lock();
            if jar.generation <= *seen {
                return Ok(());
            }
            let lines: Vec<String> = jar.cookies.iter().map(|(_, line)| line.clone()).collect();
            (jar.generation, lines)
        };
        easy.cookie_list("ALL")?;
        for line in &lines {
            easy.cookie_list(line)?;
        }
        *seen = generation;
        Ok(())
    }
}
