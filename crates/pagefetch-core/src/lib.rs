pub mod config;
pub mod logging;

pub mod auth;
pub mod cancel;
pub mod canonical;
pub mod client;
pub mod clock;
pub mod fetch;
pub mod politeness;
pub mod pool;
pub mod reaper;

pub use cancel::{CancelToken, Interrupted};
pub use config::FetchConfig;
pub use fetch::{Entity, FetchError, FetchResult, Outcome, PageFetcher};
