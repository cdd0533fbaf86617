//! HTTP server for the thumbnail endpoints
//!
//! Provides /health and /thumb.

use crate::config::ThumbnailConfig;
use crate::error::{Result, ThumbnailError};
use crate::pipeline::{self, ImageKind};
use crate::request::{validate_filename, ThumbQuery, ThumbRequest};
use crate::types::HealthResponse;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use thumb_cache::ThumbCache;
use thumb_geometry::Geometry;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: ThumbCache,
    pub config: ThumbnailConfig,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: ThumbCache, config: ThumbnailConfig) -> Self {
        Self {
            cache,
            config,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/thumb", get(get_thumb))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache_stats = state.cache.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: cache_stats,
    })
}

/// Get a thumbnail of an uploaded image
async fn get_thumb(State(state): State<SharedState>, Query(query): Query<ThumbQuery>) -> Response {
    match serve_thumb(&state, query).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn serve_thumb(state: &ServerState, query: ThumbQuery) -> Result<Response> {
    let request = ThumbRequest::from_query(query, state.config.default_quality)?;
    let filename = request.filename.as_str();

    if let Err(e) = validate_filename(filename) {
        warn!(filename = %filename, "Rejected thumbnail request");
        return error_image_response(StatusCode::BAD_REQUEST, &e.to_string(), &request).await;
    }

    let source = state.config.uploads_dir.join(filename);
    let source_modified = match tokio::fs::metadata(&source).await {
        Ok(meta) if meta.is_file() => meta.modified()?,
        _ => {
            let message = format!("Image file {} was not found.", filename);
            return error_image_response(StatusCode::NOT_FOUND, &message, &request).await;
        }
    };

    let probe = {
        let source = source.clone();
        tokio::task::spawn_blocking(move || pipeline::probe(&source)).await?
    };
    let probe = match probe {
        Ok(probe) => probe,
        Err(e) => {
            debug!(filename = %filename, error = %e, "Cannot thumbnail, redirecting to original");
            return Ok(redirect_to_original(&state.config, filename));
        }
    };

    let geometry = thumb_geometry::resolve(probe.dimensions, request.constraints);
    if geometry.is_empty() || geometry.fits_original {
        return Ok(redirect_to_original(&state.config, filename));
    }

    let key = ThumbCache::cache_key(
        filename,
        geometry.width,
        geometry.height,
        request.quality,
        request.constraints.square,
    );
    let cache_path = state.cache.cache_path(&key, probe.kind.extension());

    if request.invalidate_cache {
        if let Err(e) = state.cache.invalidate(&cache_path).await {
            warn!(path = ?cache_path, error = %e, "Failed to remove cached thumbnail");
        }
    } else if let Some(cached) = state.cache.get(&cache_path, source_modified).await {
        debug!(filename = %filename, "Serving cached thumbnail");
        let cache_filename = ThumbCache::cache_filename(&key, probe.kind.extension());
        return Ok(cached_response(
            cached.data,
            cached.modified,
            probe.kind,
            &cache_filename,
            state.config.expires_days,
        ));
    }

    debug!(
        filename = %filename,
        width = geometry.width,
        height = geometry.height,
        "Generating thumbnail"
    );
    let data = render(source, geometry, probe.kind, request.quality).await?;

    if request.write_cache {
        if let Err(e) = state.cache.put(&cache_path, &data).await {
            warn!(filename = %filename, error = %e, "Failed to cache thumbnail");
            // Continue even if caching fails
        }
    }

    Ok(generated_response(
        data,
        DateTime::<Utc>::from(source_modified),
        probe.kind,
        filename,
    ))
}

async fn render(
    source: PathBuf,
    geometry: Geometry,
    kind: ImageKind,
    quality: u8,
) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || pipeline::render(&source, &geometry, kind, quality)).await?
}

/// Format a timestamp as an HTTP date (RFC 7231 IMF-fixdate)
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Content-Disposition` value restricted to characters a header can carry
fn inline_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("inline; filename=\"{}\"", safe)
}

fn build(builder: axum::http::response::Builder, body: Body) -> Response {
    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn redirect_to_original(config: &ThumbnailConfig, filename: &str) -> Response {
    let location = config.original_url(filename);
    debug!(filename = %filename, location = %location, "Redirecting to original");

    build(
        Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location),
        Body::empty(),
    )
}

fn cached_response(
    data: Vec<u8>,
    modified: DateTime<Utc>,
    kind: ImageKind,
    cache_filename: &str,
    expires_days: i64,
) -> Response {
    let expires = Utc::now() + Duration::days(expires_days);

    build(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::LAST_MODIFIED, http_date(modified))
            .header(header::CONTENT_TYPE, kind.mime())
            .header(header::CACHE_CONTROL, "public")
            .header(header::EXPIRES, http_date(expires))
            .header(header::CONTENT_DISPOSITION, inline_disposition(cache_filename))
            .header("X-Cache", "HIT"),
        Body::from(data),
    )
}

fn generated_response(
    data: Vec<u8>,
    source_modified: DateTime<Utc>,
    kind: ImageKind,
    filename: &str,
) -> Response {
    build(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::LAST_MODIFIED, http_date(source_modified))
            .header(header::CONTENT_TYPE, kind.mime())
            .header(header::CONTENT_DISPOSITION, inline_disposition(filename))
            .header("X-Cache", "MISS"),
        Body::from(data),
    )
}

/// Serve a placeholder image so broken thumbnails don't collapse page layouts
async fn error_image_response(
    status: StatusCode,
    message: &str,
    request: &ThumbRequest,
) -> Result<Response> {
    let (width, height) = pipeline::error_image_size(
        request.constraints.max_width,
        request.constraints.max_height,
    );
    let data = tokio::task::spawn_blocking(move || pipeline::error_image(width, height))
        .await?
        .map_err(|e| ThumbnailError::Internal(format!("Failed to draw error image: {}", e)))?;

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CONTENT_DISPOSITION, "inline; filename=\"error.png\"");
    if let Ok(value) = header::HeaderValue::from_str(message) {
        builder = builder.header("X-Thumbnail-Error", value);
    }

    Ok(build(builder, Body::from(data)))
}
