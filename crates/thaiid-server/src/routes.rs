//! HTTP surface
//!
//! [`build_router`] wires the handlers to shared state. Middleware layers are
//! attached by the binary so tests can drive the bare router.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::hub::Hub;
use crate::ws;

pub const SERVICE_NAME: &str = "Thai ID Card Reader";

pub struct AppState {
    pub hub: Hub,
}

impl AppState {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub subscribers: usize,
}

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.hub.subscriber_count().await {
        Ok(subscribers) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                service: SERVICE_NAME,
                subscribers,
            }),
        ),
        Err(err) => {
            warn!(error = %err, "Health check could not reach the hub");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    service: SERVICE_NAME,
                    subscribers: 0,
                }),
            )
        }
    }
}
