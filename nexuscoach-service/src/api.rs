//! HTTP API for the NexusCoach service.
//!
//! This module provides the REST API endpoints for:
//! - Session lifecycle and turns (text and audio)
//! - Catalog administration and turn logs
//! - Health and metrics monitoring

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{I18nError, ServiceError};
use crate::i18n::resolve_locale;
use crate::service::{CoachService, HealthReport};

pub mod admin;
pub mod sessions;
use admin::{
    champion_handler, item_handler, items_handler, recent_turns_handler, session_turns_handler,
    sync_game_data_handler,
};
use sessions::{
    audio_turn_handler, end_session_body_handler, end_session_handler, start_session_handler,
    turn_body_handler, turn_handler,
};

/// Largest accepted audio upload
const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<CoachService>,
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError, locale: &str) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), locale)
    }
}

/// Success body: `{"ok": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: T,
}

pub fn envelope<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { ok: true, data })
}

/// Locale for error messages, from `Accept-Language`
pub fn header_locale(headers: &HeaderMap) -> &'static str {
    resolve_locale(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Build the API router
pub fn router(service: Arc<CoachService>, metrics: Option<PrometheusHandle>) -> Router {
    let state = Arc::new(AppState {
        service,
        metrics,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin_routes = Router::new()
        .route("/sync-game-data", post(sync_game_data_handler))
        .route("/champion/{name}", get(champion_handler))
        .route("/item/{name}", get(item_handler))
        .route("/items", get(items_handler))
        .route("/session/{id}/turns", get(session_turns_handler))
        .route("/turns", get(recent_turns_handler));

    Router::new()
        // Session endpoints
        .route("/session/start", post(start_session_handler))
        .route("/session/end", post(end_session_body_handler))
        .route("/session/{id}/turn", post(turn_handler))
        .route("/session/{id}/end", post(end_session_handler))
        .route("/turn", post(turn_body_handler))
        .route(
            "/turn/audio",
            post(audio_turn_handler).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .nest("/admin", admin_routes)
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

#[derive(Serialize)]
struct HealthResponse {
    #[serde(flatten)]
    report: HealthReport,
    uptime_seconds: u64,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Envelope<HealthResponse>> {
    envelope(HealthResponse {
        report: state.service.health(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
