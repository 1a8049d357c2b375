use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::common::errors::{ApiError, DomainError, ErrorKind};
use crate::domain::services::ip_filter;
use crate::interfaces::middleware::client_ip;
use crate::interfaces::state::AppState;

const WHITELISTED_PREFIXES: &[&str] = &["/healthz", "/metrics", "/t/"];

fn is_whitelisted(path: &str) -> bool {
    path == "/" || WHITELISTED_PREFIXES.iter().any(|p| path == *p || path.starts_with(p))
}

/// Global IP allow/deny check (spec.md §4.2, §4.8). A handful of paths
/// bypass the filter entirely so health checks and the landing page work
/// even from outside the configured network.
pub async fn ip_filter(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if is_whitelisted(req.uri().path()) {
        return next.run(req).await;
    }

    let connect_info = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
    let ip = match client_ip::resolve(req.headers(), connect_info) {
        Some(ip) => ip,
        None => {
            return ApiError(DomainError::new(ErrorKind::Forbidden, "ip_filter", "could not resolve client address"))
                .into_response()
        }
    };

    let snapshot = state.config.current();
    if ip_filter::check(ip, &snapshot.ip_filter.allow, &snapshot.ip_filter.deny) {
        next.run(req).await
    } else {
        ApiError(DomainError::new(ErrorKind::Forbidden, "ip_filter", "client address not allowed")).into_response()
    }
}
