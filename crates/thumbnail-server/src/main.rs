//! Thumbnail Server - on-demand image thumbnails with a file cache
//!
//! Resizes or square-crops uploaded images to the size a page asks for and
//! keeps each rendered variant on disk until its source changes.

mod config;
mod error;
mod pipeline;
mod request;
mod server;
mod types;

use crate::config::ThumbnailConfig;
use crate::error::{Result, ThumbnailError};
use crate::server::{start_server, ServerState, SharedState};
use std::sync::Arc;
use thumb_cache::ThumbCache;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter =
        EnvFilter::from_default_env().add_directive("thumbnail_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Thumbnail Server...");

    let config = ThumbnailConfig::from_env();
    info!("Port: {}", config.port);
    info!("Uploads dir: {:?}", config.uploads_dir);
    info!("Uploads URL: {}", config.uploads_url);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Default quality: {}", config.default_quality);

    if !config.uploads_dir.is_dir() {
        return Err(ThumbnailError::Config(format!(
            "uploads directory {:?} does not exist",
            config.uploads_dir
        )));
    }

    let cache = ThumbCache::new(config.cache_dir.clone());
    cache.init().await?;

    let port = config.port;
    let state: SharedState = Arc::new(ServerState::new(cache, config));

    // Start HTTP server (blocking)
    start_server(state, port)
        .await
        .map_err(|e| ThumbnailError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
