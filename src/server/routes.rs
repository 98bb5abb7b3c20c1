//! HTTP routes.
//!
//! - `GET /api/tweets?max_results=N` - recent posts
//! - `GET /api/youtube?max_results=N` - recent videos
//! - `GET /api/health` - configuration and per-resource cache state
//! - `GET /` - service description

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::presenter::{self, PresentedResponse};
use crate::proxy::{CacheProxy, ResourceStatus};
use crate::types::Resource;

pub const TWEETS_PATH: &str = "/api/tweets";
pub const VIDEOS_PATH: &str = "/api/youtube";
pub const HEALTH_PATH: &str = "/api/health";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<CacheProxy>,
}

/// Build the router with CORS restricted to `cors_origin` (`*` for any).
pub fn router(proxy: Arc<CacheProxy>, cors_origin: &str) -> Router {
    Router::new()
        .route("/", get(root))
        .route(TWEETS_PATH, get(tweets))
        .route(VIDEOS_PATH, get(videos))
        .route(HEALTH_PATH, get(health))
        .fallback(not_found)
        .with_state(AppState { proxy })
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .expose_headers([
            HeaderName::from_static("x-cache"),
            HeaderName::from_static("x-cache-age"),
            HeaderName::from_static("x-cache-age-minutes"),
            HeaderName::from_static("x-cache-expires-in"),
            HeaderName::from_static("x-cache-warning"),
            HeaderName::from_static("x-api-error"),
            HeaderName::from_static("retry-after"),
        ]);

    if origin == "*" {
        return cors.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => {
            info!(origin, "CORS restricted to configured origin");
            cors.allow_origin(value)
        }
        Err(_) => {
            warn!(origin, "invalid CORS origin, allowing any");
            cors.allow_origin(Any)
        }
    }
}

// ============================================================================
// Resource handlers
// ============================================================================

/// `max_results` query parameter; unparseable values fall back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default, alias = "maxResults")]
    max_results: Option<String>,
}

impl PageQuery {
    fn max_results(&self) -> Option<u32> {
        self.max_results
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
    }
}

async fn tweets(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    serve(&state, Resource::Tweets, &query).await
}

async fn videos(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    serve(&state, Resource::YoutubeVideos, &query).await
}

async fn serve(state: &AppState, resource: Resource, query: &PageQuery) -> Response {
    let result = state.proxy.get(resource, query.max_results()).await;
    to_response(presenter::present(resource, result))
}

/// Convert a presented response into an axum response.
fn to_response(presented: PresentedResponse) -> Response {
    let status =
        StatusCode::from_u16(presented.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(presented.body)).into_response();
    let headers = response.headers_mut();
    for (name, value) in presented.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        match HeaderValue::from_str(&header_safe(&value)) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(e) => warn!(header = %name, error = %e, "dropping response header"),
        }
    }
    response
}

/// Replace characters a header value cannot carry.
fn header_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect()
}

// ============================================================================
// Service endpoints
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub configured: bool,
    pub message: &'static str,
    pub resources: BTreeMap<&'static str, ResourceStatus>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let configured = state.proxy.is_configured();
    let resources = state
        .proxy
        .status()
        .into_iter()
        .map(|status| (status.resource.key(), status))
        .collect();
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        version: crate::version_string(),
        configured,
        message: if configured {
            "All resources configured"
        } else {
            "Some resources are missing credentials"
        },
        resources,
    })
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": crate::PKG_NAME,
        "version": crate::PKG_VERSION,
        "endpoints": {
            "tweets": TWEETS_PATH,
            "videos": VIDEOS_PATH,
            "health": HEALTH_PATH,
        },
    }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Route not found",
        })),
    )
        .into_response()
}
