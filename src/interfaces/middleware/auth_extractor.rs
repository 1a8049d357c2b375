use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;

use crate::common::errors::{ApiError, DomainError, ErrorKind};
use crate::domain::entities::user::Principal;
use crate::interfaces::state::AppState;

/// Extracts and verifies the `Authorization: Basic` credentials for a
/// request, rejecting with `401` (and a `WWW-Authenticate: Basic` header,
/// attached by [`ApiError`]) when absent or invalid.
pub struct AuthenticatedUser(pub Principal);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let State(state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .expect("AppState extraction is infallible");

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let snapshot = state.config.current();
        match state.auth.authenticate(&snapshot, header) {
            Some(principal) => Ok(AuthenticatedUser(principal)),
            None => Err(ApiError(DomainError::new(ErrorKind::AuthRequired, "auth", "authentication required"))),
        }
    }
}
