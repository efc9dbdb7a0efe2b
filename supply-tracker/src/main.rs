use supply_tracker::config;
use supply_tracker::module::frame::FrameImageRenderer;
use supply_tracker::module::supply::{HttpSupplyFetcher, SupplyCache, SupplySource};
use supply_tracker::service::{self, TrackerService};

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    config::read_config()?;
    let config = config::CONFIG
        .get()
        .ok_or_else(|| anyhow::anyhow!("Configuration not initialized"))?;

    // Initialize logging
    let _logging_guard = supply_tracker::logging::init_logging(
        "logs",
        "supply-tracker",
        &config.log_level,
        config.log_retention(),
    )?;

    tracing::info!("Supply tracker starting...");
    tracing::info!(
        "Upstream: {:?} at {} (timeout {}s)",
        config.provider,
        config.upstream_url(),
        config.upstream_timeout_secs
    );
    match &config.base_url {
        Some(url) => tracing::info!("Frame links use base URL {}", url),
        None => tracing::info!("No base URL configured, frame links follow the request origin"),
    }

    let fetcher: Arc<dyn SupplySource> = Arc::new(HttpSupplyFetcher::new(
        config.provider,
        config.upstream_url(),
        Duration::from_secs(config.upstream_timeout_secs),
    )?);
    let cache = Arc::new(SupplyCache::new(fetcher.clone()));
    tracing::info!("Supply cache TTL: {:?}", cache.ttl());

    // Font loading touches the filesystem; keep it off the async workers
    let renderer = tokio::task::spawn_blocking(|| FrameImageRenderer::new(Some(Path::new("fonts")))).await?;

    let tracker = Arc::new(TrackerService::new(
        fetcher,
        cache,
        Arc::new(renderer),
        config.base_url.clone(),
    ));

    service::serve(tracker, &config.server_address(), config.enable_cors).await
}
