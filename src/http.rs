//! HTTP server for health checks, Prometheus metrics and the interaction
//! webhook.
//!
//! Runs on a separate tokio task. `/interactions` is only routed when an
//! application public key is configured.

use crate::commands::Registry;
use crate::interactions::{Interaction, SignatureVerifier};
use crate::warden::Warden;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

#[derive(Clone)]
pub struct HttpState {
    pub warden: Arc<Warden>,
    pub registry: Arc<Registry>,
    pub verifier: Option<Arc<SignatureVerifier>>,
}

/// Handler for GET /health.
async fn health_handler() -> &'static str {
    "OK"
}

async fn root_handler() -> &'static str {
    "Bot running"
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Handler for POST /interactions.
async fn interactions_handler(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(ref verifier) = state.verifier else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let (Some(signature), Some(timestamp)) = (header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER))
    else {
        return (StatusCode::UNAUTHORIZED, "missing signature").into_response();
    };
    if !verifier.verify(timestamp, &body, signature) {
        debug!("Rejected interaction with bad signature");
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(i) => i,
        Err(e) => {
            warn!(error = %e, "Malformed interaction payload");
            return (StatusCode::BAD_REQUEST, "malformed interaction").into_response();
        }
    };

    let resp = crate::interactions::respond(&state.warden, &state.registry, &interaction).await;
    Json(resp).into_response()
}

pub fn router(state: HttpState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));
    if state.verifier.is_some() {
        app = app.route("/interactions", post(interactions_handler));
    }
    app.with_state(state)
}

/// Run the HTTP server until `shutdown` flips.
///
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(addr: SocketAddr, state: HttpState, mut shutdown: watch::Receiver<bool>) {
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };
    info!(addr = %addr, "HTTP server listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await;
    if let Err(e) = result {
        error!(error = %e, "HTTP server error");
    }
}
