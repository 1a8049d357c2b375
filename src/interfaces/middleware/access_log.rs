use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::interfaces::state::AppState;

/// Records method, path, status, byte count, duration and the caller's
/// basic-auth username (if present), without re-verifying credentials
/// (spec.md §4.8).
pub async fn access_log(State(state): State<AppState>, req: Request, next: Next) -> Response {
    state.metrics.record_request();

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let principal = basic_auth_username(&req);
    let user_agent = req
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis();
    let bytes = response
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    info!(
        %method,
        path,
        status = response.status().as_u16(),
        bytes,
        duration_ms = elapsed_ms,
        principal = principal.as_deref().unwrap_or("-"),
        user_agent,
        "request"
    );

    response
}

fn basic_auth_username(req: &Request) -> Option<String> {
    let header = req.headers().get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    decoded.split_once(':').map(|(name, _)| name.to_string())
}
