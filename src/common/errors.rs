use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// The error taxonomy from spec.md §7, shared by every layer. Leaf
/// components raise `DomainError` directly; the HTTP boundary converts it
/// to the `{code, msg, data}` envelope via [`ApiError`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct DomainError {
    pub kind: ErrorKind,
    pub context: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthRequired,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    QuotaExceeded,
    RateLimited,
    BadRequest,
    BadPath,
    PathTraversal,
    InternalError,
}

impl DomainError {
    pub fn new(kind: ErrorKind, context: &'static str, message: impl Into<String>) -> Self {
        Self { kind, context, message: message.into() }
    }

    pub fn not_found(context: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, context, message)
    }

    pub fn forbidden(context: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, context, message)
    }

    pub fn conflict(context: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, context, message)
    }

    pub fn bad_request(context: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, context, message)
    }

    pub fn internal_error(context: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, context, message)
    }

    /// HTTP status mirrored for this kind, per spec.md §7's table, plus the
    /// internal error codes used in the JSON envelope (`0` success,
    /// `1` generic `ERROR`, `500` `INTERNAL_ERROR`).
    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::AuthRequired => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PayloadTooLarge | ErrorKind::QuotaExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::BadRequest | ErrorKind::BadPath | ErrorKind::PathTraversal => StatusCode::BAD_REQUEST,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i32 {
        self.status().as_u16() as i32
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => DomainError::not_found("io", e.to_string()),
            std::io::ErrorKind::PermissionDenied => DomainError::forbidden("io", e.to_string()),
            std::io::ErrorKind::AlreadyExists => DomainError::conflict("io", e.to_string()),
            _ => DomainError::internal_error("io", e.to_string()),
        }
    }
}

impl From<crate::domain::services::path_resolver::PathResolveError> for DomainError {
    fn from(e: crate::domain::services::path_resolver::PathResolveError) -> Self {
        use crate::domain::services::path_resolver::PathResolveError as P;
        match e {
            P::Traversal => DomainError::new(ErrorKind::PathTraversal, "path_resolver", "path traversal rejected"),
            P::BadPath => DomainError::new(ErrorKind::BadPath, "path_resolver", "unresolvable path"),
        }
    }
}

impl From<crate::domain::services::rule_evaluator::DenyReason> for DomainError {
    fn from(r: crate::domain::services::rule_evaluator::DenyReason) -> Self {
        use crate::domain::services::rule_evaluator::DenyReason as R;
        match r {
            R::AuthRequired => DomainError::new(ErrorKind::AuthRequired, "rules", "authentication required"),
            other => DomainError::new(ErrorKind::Forbidden, "rules", other.as_str()),
        }
    }
}

/// Wraps a [`DomainError`] for the JSON API boundary: `IntoResponse`
/// produces the `{code, msg, data}` envelope every endpoint shares,
/// matching the single-sink error conversion idiom used throughout the
/// corpus's HTTP layers.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Envelope {
            code: i32,
            msg: String,
            data: Value,
        }

        let status = self.0.status();
        let mut response = (
            status,
            Json(Envelope { code: self.0.code(), msg: self.0.message, data: Value::Null }),
        )
            .into_response();

        if self.0.kind == ErrorKind::AuthRequired {
            response
                .headers_mut()
                .insert(axum::http::header::WWW_AUTHENTICATE, "Basic".parse().unwrap());
        }
        if self.0.kind == ErrorKind::RateLimited {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, "1".parse().unwrap());
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
