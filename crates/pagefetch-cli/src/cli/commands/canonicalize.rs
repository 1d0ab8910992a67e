//! `pagefetch canonicalize <url> [--base BASE]`

use anyhow::Result;
use pagefetch_core::canonical;

pub fn run_canonicalize(url: &str, base: Option<&str>) -> Result<()> {
    let canonical = match base {
        Some(base) => canonical::resolve(url, base)?,
        None => canonical::canonicalize(url)?,
    };
    println!("{}", canonical);
    Ok(())
}
