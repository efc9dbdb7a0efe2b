//! HTTP surface: JSON supply endpoints, the frame card and its image.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::error::SupplyError;
use crate::module::frame::{
    CardRequest, CardResponder, FrameAction, FrameImageRenderer, FRAME_IMAGE_PATH, FRAME_PATH,
    PLACEHOLDER_SUPPLY, resolve_supply_text,
};
use crate::module::supply::{SupplyCache, SupplySource, SupplyStats};

/// Used when neither configuration nor the request names a public origin
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Shared handles for every request
pub struct TrackerService {
    cache: Arc<SupplyCache>,
    /// Direct upstream access for the image fallback, bypassing the cache
    source: Arc<dyn SupplySource>,
    responder: CardResponder,
    renderer: Arc<FrameImageRenderer>,
    base_url: Option<String>,
}

impl TrackerService {
    pub fn new(
        source: Arc<dyn SupplySource>,
        cache: Arc<SupplyCache>,
        renderer: Arc<FrameImageRenderer>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            responder: CardResponder::new(cache.clone()),
            cache,
            source,
            renderer,
            base_url,
        }
    }

    /// Configured origin, else the origin the request was addressed to, else the default.
    fn base_url(&self, headers: &HeaderMap) -> String {
        self.base_url
            .clone()
            .or_else(|| request_origin(headers))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }
}

fn request_origin(headers: &HeaderMap) -> Option<String> {
    // Proxy chains append, so the client-facing host is the first entry
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim();
    if host.is_empty() {
        return None;
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim())
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or("http");

    Some(format!("{}://{}", scheme, host))
}

pub fn router(service: Arc<TrackerService>, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(landing_page))
        .route("/health", get(health_check))
        .route("/supply", get(supply))
        .route("/btc", get(btc_stats))
        .route(FRAME_PATH, get(frame_info).post(frame_action))
        .route(FRAME_IMAGE_PATH, get(frame_image))
        .with_state(service)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// JSON error body with a server-error status
struct ApiError(SupplyError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Supply request failed: {}", self.0);
        let body = ErrorBody {
            error: "Unable to fetch Bitcoin supply data".to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<SupplyError> for ApiError {
    fn from(e: SupplyError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct SupplyBody {
    supply: f64,
    timestamp: DateTime<Utc>,
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn supply(State(service): State<Arc<TrackerService>>) -> Result<Json<SupplyBody>, ApiError> {
    let reading = service.cache.get_supply().await?;
    Ok(Json(SupplyBody {
        supply: reading.display_units,
        timestamp: reading.fetched_at,
    }))
}

async fn btc_stats(State(service): State<Arc<TrackerService>>) -> Result<Json<SupplyStats>, ApiError> {
    let reading = service.cache.get_supply().await?;
    Ok(Json(SupplyStats::from(&reading)))
}

async fn landing_page(
    State(service): State<Arc<TrackerService>>,
    headers: HeaderMap,
) -> Html<String> {
    let base_url = service.base_url(&headers);
    let card = service.responder.respond(CardRequest::InitialRender, &base_url).await;
    Html(card.to_landing_html())
}

#[derive(Serialize)]
struct FrameInfo {
    message: &'static str,
}

async fn frame_info() -> Json<FrameInfo> {
    Json(FrameInfo {
        message: "Use POST to interact with the Frame",
    })
}

async fn frame_action(
    State(service): State<Arc<TrackerService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Html<String> {
    match FrameAction::parse(&body) {
        Some(action) => debug!(
            "Frame action: button={:?} fid={:?}",
            action.button_index(),
            action.fid()
        ),
        None => debug!("Frame action without a readable payload ({} bytes)", body.len()),
    }

    let base_url = service.base_url(&headers);
    let card = service.responder.respond(CardRequest::ButtonPress, &base_url).await;
    Html(card.to_html())
}

#[derive(Debug, Deserialize)]
struct FrameImageQuery {
    supply: Option<String>,
}

async fn frame_image(
    State(service): State<Arc<TrackerService>>,
    Query(query): Query<FrameImageQuery>,
) -> Response {
    let text = resolve_supply_text(query.supply, service.source.as_ref()).await;

    let renderer = service.renderer.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        renderer.render_png(&text).or_else(|e| {
            error!("Frame image render failed for {:?}, retrying with placeholder: {}", text, e);
            renderer.render_png(PLACEHOLDER_SUPPLY)
        })
    })
    .await;

    match rendered {
        Ok(Ok(png)) => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "public, max-age=30"),
            ],
            png,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!("Frame image render failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!("Frame image render task panicked: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn serve(service: Arc<TrackerService>, address: &str, enable_cors: bool) -> anyhow::Result<()> {
    let app = router(service, enable_cors);

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Supply tracker listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
