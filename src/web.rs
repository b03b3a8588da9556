//! Axum-based HTTP server exposing the orchestrator API
//!
//! Routes cover start/stop session actions, charge-point reads, persisted
//! session reads, health, transient charging state, and a server-sent
//! event stream of session events.

use crate::controller::SessionController;
use crate::error::AurigaError;
use crate::events::EventBus;
use crate::store::SessionStore;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub store: Arc<dyn SessionStore>,
    pub bus: Arc<EventBus>,
}

/// Map an orchestrator error onto an HTTP response
fn error_response(err: &AurigaError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        AurigaError::Validation { .. } => StatusCode::BAD_REQUEST,
        AurigaError::Auth { .. } => StatusCode::UNAUTHORIZED,
        AurigaError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn start_charging(
    State(state): State<AppState>,
    Path((charge_point_id, evse_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    match state.controller.start(charge_point_id, evse_id).await {
        Ok(outcome) if outcome.success => (
            StatusCode::ACCEPTED,
            Json(serde_json::to_value(&outcome).unwrap_or_default()),
        ),
        Ok(outcome) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::to_value(&outcome).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn stop_charging(
    State(state): State<AppState>,
    Path(charge_point_id): Path<i64>,
) -> impl IntoResponse {
    match state.controller.stop(charge_point_id).await {
        Ok(outcome) if outcome.success => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": outcome.message })),
        ),
        Ok(outcome) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::to_value(&outcome).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn charge_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.controller.charge_point(id).await {
        Ok(details) => (StatusCode::OK, Json(details)),
        Err(e) => error_response(&e),
    }
}

async fn charge_point_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.controller.charge_point_status(id).await {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::to_value(&status).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.find_by_session(&id).await {
        Ok(rows) if rows.is_empty() => {
            error_response(&AurigaError::not_found(format!("session {}", id)))
        }
        Ok(rows) => (
            StatusCode::OK,
            Json(serde_json::to_value(&rows).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn sessions(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(rows) if rows.is_empty() => error_response(&AurigaError::not_found(
            "No stored sessions in the database",
        )),
        Ok(rows) => (
            StatusCode::OK,
            Json(serde_json::to_value(&rows).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn charging_state(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.state_snapshot() {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(serde_json::to_value(&snapshot).unwrap_or_default()),
        ),
        Err(e) => error_response(&e),
    }
}

async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.bus.subscribe_stream();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok::<Event, std::convert::Infallible>(
                Event::default().event(event.kind()).data(data),
            ))
        }
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/start/{charge_point_id}/{evse_id}", post(start_charging))
        .route("/api/stop/{charge_point_id}", post(stop_charging))
        .route("/api/charge-point/{id}", get(charge_point))
        .route("/api/charge-point/{id}/status", get(charge_point_status))
        .route("/api/session/{id}", get(session))
        .route("/api/sessions", get(sessions))
        .route("/api/state", get(charging_state))
        .route("/api/events", get(events))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(state);

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let (addr, parsed_ok): (SocketAddr, bool) = match host.parse::<IpAddr>() {
        Ok(ip) => (SocketAddr::new(ip, port), true),
        Err(_) => (([127, 0, 0, 1], port).into(), false),
    };
    if !parsed_ok {
        logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}
