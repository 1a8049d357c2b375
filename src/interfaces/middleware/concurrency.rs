use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::common::errors::{ApiError, DomainError, ErrorKind};
use crate::interfaces::state::AppState;

const ACQUIRE_GRACE: Duration = Duration::from_millis(100);

/// Counting semaphore admission control: try-acquire with a short grace
/// timeout to absorb micro-bursts before rejecting (spec.md §4.8). The
/// permit is held for the lifetime of `next.run`, guaranteeing release on
/// every exit path including panics unwound through the Tokio task.
pub async fn concurrency_cap(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let semaphore = state.concurrency.read().await.clone();
    match tokio::time::timeout(ACQUIRE_GRACE, semaphore.acquire_owned()).await {
        Ok(Ok(_permit)) => next.run(req).await,
        _ => {
            state.metrics.record_concurrency_rejected();
            ApiError(DomainError::new(ErrorKind::RateLimited, "concurrency", "server busy")).into_response()
        }
    }
}
