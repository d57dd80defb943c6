//! Source adapters and the health registry that gates them.
//!
//! Every adapter returns a list of `DiscoveryItem`s with adapter-specific
//! detail tucked away in `raw_data`; `Scout` (in `content-pipeline`) is the
//! only caller that touches this crate directly.

mod adapter;
mod github_trending;
mod hackernews;
mod health;
mod lobsters;
mod reddit;

pub use adapter::SourceAdapter;
pub use github_trending::GitHubTrendingSource;
pub use hackernews::HackerNewsSource;
pub use health::{HealthRegistry, SourceHealth, REDUCED_THRESHOLD, SKIP_THRESHOLD};
pub use lobsters::LobstersSource;
pub use reddit::RedditSource;

/// The default adapter set the daemon wires up at startup.
pub fn default_sources() -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(HackerNewsSource::new()),
        Box::new(RedditSource::new()),
        Box::new(LobstersSource::new()),
        Box::new(GitHubTrendingSource::new()),
    ]
}
