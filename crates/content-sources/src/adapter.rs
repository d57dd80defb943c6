use content_core::types::DiscoveryItem;

/// One external feed, normalized into `DiscoveryItem`s. Implementors own their
/// own HTTP client and per-source minimum-quality cutoff; the core never
/// inspects `raw_data` beyond passing it through.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must complete or give up within its own timeout. A failed fetch
    /// returns `Err`; a partial fetch (some items dropped, none fatal)
    /// returns `Ok` with a shorter list — both are legitimate outcomes, the
    /// distinction only matters to `HealthRegistry` accounting.
    async fn fetch(&self) -> content_core::CoreResult<Vec<DiscoveryItem>>;
}
