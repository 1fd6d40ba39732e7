//! Thin HTTP controller exposing the locator over `axum` (spec.md §6.2).
//!
//! Grounded on the pack's one `axum` + `tokio` + `tracing` ingestion
//! service (`other_examples`'s sinyalist backend): a `Router` built from a
//! small `AppState`, `TraceLayer` for request logging, JSON bodies in and
//! out. Unlike that service this one is entirely synchronous underneath —
//! `Engine::locate` runs on the async handler's calling task since a single
//! location run is CPU-bound and short, not I/O-bound.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::core::engine::Engine;
use crate::core::travel_time::Ak135TravelTimeTable;
use crate::io::request::LocationRequest;
use crate::io::response::LocationResponse;

struct AppState {
    engine: Mutex<Engine<Ak135TravelTimeTable>>,
}

pub fn build_router(engine: Engine<Ak135TravelTimeTable>) -> Router {
    let state = Arc::new(AppState {
        engine: Mutex::new(engine),
    });
    Router::new()
        .route("/health", get(health))
        .route("/locate", post(locate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(engine: Engine<Ak135TravelTimeTable>, addr: SocketAddr) -> std::io::Result<()> {
    let router = build_router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "locator_service listening");
    axum::serve(listener, router).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn locate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LocationRequest>,
) -> impl IntoResponse {
    let mut event = match request.into_event() {
        Ok(event) => event,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };

    let mut engine = state.engine.lock().expect("engine lock poisoned");
    let (status, ellipsoid) = engine.locate(&mut event);
    let response = LocationResponse::from_event(&event, status, ellipsoid);
    (StatusCode::OK, Json(response)).into_response()
}
