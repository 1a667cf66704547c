use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::app::ingest_use_case::IngestService;
use crate::types::StorageEvent;

/// Shared handler state; the lock keeps invocations from interleaving their
/// staging and production writes.
#[derive(Clone)]
pub struct ServerState {
    service: IngestService,
    running: Arc<Mutex<()>>,
}

impl ServerState {
    pub fn new(service: IngestService) -> Self {
        Self {
            service,
            running: Arc::new(Mutex::new(())),
        }
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shopper-ingest",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Storage notification handler: one object-finalized event per request
async fn handle_event(Extension(state): Extension<ServerState>, Json(event): Json<StorageEvent>) -> Response {
    let _guard = state.running.lock().await;
    info!(bucket = %event.bucket, name = %event.name, "Received storage event");
    match state.service.handle(&event).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            error!(bucket = %event.bucket, name = %event.name, error = %e, "Event processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn create_server(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", post(handle_event))
        .layer(Extension(state))
}

/// Start the HTTP server on the specified port
pub async fn start_server(service: IngestService, port: u16) -> anyhow::Result<()> {
    let app = create_server(ServerState::new(service));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📥 Events:       POST http://localhost:{port}/events");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
