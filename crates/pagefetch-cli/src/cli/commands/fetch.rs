//! `pagefetch fetch <url>...` – fetch pages with N blocking workers.

use anyhow::{bail, Context, Result};
use pagefetch_core::fetch::classify_status;
use pagefetch_core::{FetchConfig, FetchResult, PageFetcher};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

type Queue = Mutex<VecDeque<(usize, String)>>;
type Line = (usize, Result<String, String>);

/// One output line: status, class, entity bytes, entity SHA-256, URL.
fn format_result(url: &str, result: &FetchResult) -> String {
    let (bytes, digest) = match &result.entity {
        Some(entity) => (entity.len(), hex::encode(Sha256::digest(&entity.body))),
        None => (0, "-".to_string()),
    };
    let target = match (result.fetched_url(), result.moved_to_url()) {
        (Some(fetched), _) => fetched.to_string(),
        (None, Some(moved_to)) => format!("{} -> {}", url, moved_to),
        (None, None) => url.to_string(),
    };
    let truncated = if result.entity.as_ref().is_some_and(|e| e.truncated) {
        " (truncated)"
    } else {
        ""
    };
    format!(
        "{}  {:<8}  {:>8}  {}  {}{}",
        result.status_code,
        classify_status(result.status_code).as_str(),
        bytes,
        digest,
        target,
        truncated
    )
}

fn drain(fetcher: &PageFetcher, queue: &Queue) -> Vec<Line> {
    let mut lines = Vec::new();
    loop {
        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        let Some((index, url)) = next else {
            break;
        };
        let line = match fetcher.fetch(&url) {
            Ok(result) => Ok(format_result(&url, &result)),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "fetch failed");
                Err(format!("ERR  {}  {}", err, url))
            }
        };
        lines.push((index, line));
    }
    lines
}

pub async fn run_fetch(cfg: &FetchConfig, urls: Vec<String>, workers: usize) -> Result<()> {
    let total = urls.len();
    let fetcher = tokio::task::spawn_blocking({
        let cfg = cfg.clone();
        move || PageFetcher::new(&cfg)
    })
    .await
    .context("fetcher setup task join")??;
    let fetcher = Arc::new(fetcher);
    let queue: Arc<Queue> = Arc::new(Mutex::new(urls.into_iter().enumerate().collect()));

    let tasks: Vec<_> = (0..workers.clamp(1, total.max(1)))
        .map(|_| {
            let fetcher = Arc::clone(&fetcher);
            let queue = Arc::clone(&queue);
            tokio::task::spawn_blocking(move || drain(&fetcher, &queue))
        })
        .collect();
    let mut lines = Vec::with_capacity(total);
    for task in tasks {
        lines.extend(task.await.context("fetch worker join")?);
    }
    lines.sort_by_key(|(index, _)| *index);

    let mut failures = 0;
    for (_, line) in lines {
        match line {
            Ok(line) => println!("{}", line),
            Err(line) => {
                failures += 1;
                println!("{}", line);
            }
        }
    }

    tokio::task::spawn_blocking(move || fetcher.shutdown())
        .await
        .context("fetcher shutdown task join")?;
    if failures > 0 {
        bail!("{} of {} fetches failed", failures, total);
    }
    Ok(())
}
