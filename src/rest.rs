use std::future::Future;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::BridgeError;
use crate::models::chat::{ChatCompletionRequest, ErrorEnvelope};
use crate::pipeline::Bridge;

/// Build the Axum router with `/health` and `/api/chat/completions`.
pub fn build_router(bridge: Bridge) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat/completions", post(chat_completions))
        .with_state(bridge)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
}

/// Serve the REST surface until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, bridge: Bridge, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(bridge);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

/// Upstream liveness. The HTTP status always agrees with the body's `status`.
async fn health(State(bridge): State<Bridge>) -> Response {
    let health = bridge.health().await;
    let code = if health.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health)).into_response()
}

/// Decode, run the shared pipeline and map its outcome onto HTTP.
///
/// The body is decoded by hand so malformed JSON gets our error envelope
/// rather than axum's extractor rejection.
async fn chat_completions(State(bridge): State<Bridge>, body: Bytes) -> Response {
    let req: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "Invalid request body", &e),
    };

    match bridge.chat_completion(req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(BridgeError::Invalid(e)) => {
            error_response(StatusCode::BAD_REQUEST, "Invalid request", &e)
        }
        Err(BridgeError::Upstream(e)) => {
            tracing::error!(error = %e, kind = e.kind(), "chat completion failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process chat completion",
                &e,
            )
        }
    }
}

/// Build a JSON error envelope with the given HTTP status, category and detail.
pub fn error_response(status: StatusCode, category: &str, detail: &dyn std::fmt::Display) -> Response {
    let detail = detail.to_string();
    if status.is_client_error() {
        tracing::warn!(status = status.as_u16(), error = category, message = %detail, "rejecting request");
    }
    let body = ErrorEnvelope {
        error: category.to_string(),
        message: Some(detail),
        code: Some(status.as_u16()),
    };
    (status, Json(body)).into_response()
}

/// Permissive CORS on every response; `OPTIONS` on any path answers 200 with no body.
async fn cors(req: Request, next: Next) -> Response {
    let mut resp = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };

    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    resp
}
