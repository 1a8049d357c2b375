use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;

use crate::common::errors::{ApiResult, DomainError};
use crate::domain::entities::direct_transfer::TransferDirection;
use crate::interfaces::api::dto::{
    DirectTransferCreatedResponse, DirectTransferDeleteResponse, DirectTransferListQuery, DirectTransferListResponse, Envelope,
    RecipientsResponse,
};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::state::AppState;

/// Every other user known to the system (static or dynamic), excluding the
/// caller, as valid direct-transfer recipients.
pub async fn recipients(State(state): State<AppState>, AuthenticatedUser(principal): AuthenticatedUser) -> Json<Envelope> {
    let snapshot = state.config.current();
    let recipients = snapshot.users.iter().map(|u| u.name.clone()).filter(|n| n != &principal.name).collect();
    Json(Envelope::ok(RecipientsResponse { recipients }))
}

/// Multipart form: `recipient`, optional `expiresIn`, and `file`. The
/// `recipient`/`expiresIn` fields must precede `file` so the recipient is
/// known before the payload starts streaming.
pub async fn send(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Envelope>> {
    let mut recipient: Option<String> = None;
    let mut expires_in: Option<i64> = None;
    let mut result = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| DomainError::bad_request("direct_transfer", e.to_string()))? {
        match field.name() {
            Some("recipient") => {
                recipient = Some(field.text().await.map_err(|e| DomainError::bad_request("direct_transfer", e.to_string()))?);
            }
            Some("expiresIn") => {
                let raw = field.text().await.map_err(|e| DomainError::bad_request("direct_transfer", e.to_string()))?;
                expires_in = raw.parse().ok();
            }
            Some("file") => {
                let recipient = recipient
                    .clone()
                    .ok_or_else(|| DomainError::bad_request("direct_transfer", "missing 'recipient' field"))?;
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| DomainError::bad_request("direct_transfer", "missing filename"))?;
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();

                let snapshot = state.config.current();
                let known: Vec<String> = snapshot.users.iter().map(|u| u.name.clone()).collect();
                let max_size = snapshot.max_upload_size;

                let byte_stream = field.map(|r| r.map_err(std::io::Error::other));
                let created = state
                    .transfers
                    .create(&principal.name, &recipient, &filename, &content_type, byte_stream, max_size, expires_in, &known)
                    .await?;
                result = Some(created);
            }
            _ => {}
        }
    }

    let created = result.ok_or_else(|| DomainError::bad_request("direct_transfer", "missing 'file' field"))?;
    Ok(Json(Envelope::ok(DirectTransferCreatedResponse { id: created.id, size: created.size })))
}

pub async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Query(query): Query<DirectTransferListQuery>,
) -> ApiResult<Json<Envelope>> {
    let direction = TransferDirection::parse(&query.direction)
        .ok_or_else(|| DomainError::bad_request("direct_transfer", "direction must be 'incoming' or 'outgoing'"))?;
    let transfers = state.transfers.list(&principal.name, direction).await;
    Ok(Json(Envelope::ok(DirectTransferListResponse { transfers })))
}

pub async fn download(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let payload = state.transfers.download(&principal.name, &id).await?;
    state.metrics.record_download(0);

    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        payload.filename,
        percent_encoding::utf8_percent_encode(&payload.filename, percent_encoding::NON_ALPHANUMERIC)
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, payload.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        )
        .body(Body::from_stream(payload.stream))
        .unwrap())
}

pub async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope>> {
    let action = state.transfers.delete(&principal.name, &id).await?;
    Ok(Json(Envelope::ok(DirectTransferDeleteResponse { action: action.as_str() })))
}
