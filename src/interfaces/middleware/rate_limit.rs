use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::common::errors::{ApiError, DomainError, ErrorKind};
use crate::interfaces::state::AppState;

/// Single shared token bucket; consumes 1 token per request regardless of
/// cost (spec.md §4.8). On exhaustion, `429` with `Retry-After: 1`.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let bucket = state.rate_limiter.read().await.clone();
    if bucket.try_consume(1.0) {
        next.run(req).await
    } else {
        state.metrics.record_rate_limited();
        ApiError(DomainError::new(ErrorKind::RateLimited, "rate_limit", "rate limit exceeded")).into_response()
    }
}
