use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::application::services::metrics::Metrics;
use crate::common::errors::{ApiError, DomainError};

/// Converts a panic unwound out of a handler into the same `{code, msg,
/// data}` envelope every other error produces, and counts it as an error
/// (spec.md §4.8). Built per-router so it can close over the shared
/// [`Metrics`] instance.
pub fn layer(metrics: Arc<Metrics>) -> CatchPanicLayer<impl Fn(Box<dyn Any + Send>) -> Response + Clone> {
    CatchPanicLayer::custom(move |panic: Box<dyn Any + Send>| {
        metrics.record_error();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "internal error".to_string());
        error!(message, "handler panicked");
        ApiError(DomainError::internal_error("exception_shield", "internal error")).into_response()
    })
}
