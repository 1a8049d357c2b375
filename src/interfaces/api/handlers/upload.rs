use axum::extract::{Multipart, Query, State};
use axum::Json;
use futures::StreamExt;

use crate::common::errors::{ApiResult, DomainError};
use crate::domain::entities::permission::Operation;
use crate::interfaces::api::authz::authorize;
use crate::interfaces::api::dto::{Envelope, UploadQuery, UploadResponse};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

/// Multipart form carrying `root`, `path` and `file` fields (spec.md
/// §4.9). Fields are read in whatever order the client sends them;
/// `root`/`path` must precede `file` for the upload to be authorized
/// before any payload byte is streamed to disk.
pub async fn upload(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Query(default_query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<Envelope>> {
    let mut root = Some(default_query.root);
    let mut path = default_query.path;
    let mut result: Option<u64> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| DomainError::bad_request("upload", e.to_string()))? {
        match field.name() {
            Some("root") => {
                root = Some(field.text().await.map_err(|e| DomainError::bad_request("upload", e.to_string()))?);
            }
            Some("path") => {
                path = field.text().await.map_err(|e| DomainError::bad_request("upload", e.to_string()))?;
            }
            Some("file") => {
                let root_name = root.clone().ok_or_else(|| DomainError::bad_request("upload", "missing 'root' field"))?;
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| DomainError::bad_request("upload", "missing filename"))?;

                let snapshot = state.config.current();
                let share = authorize(&snapshot, &principal.name, Operation::Upload, &root_name, &path, ip)?;
                let max_size = snapshot.max_upload_size;

                let byte_stream = field.map(|r| r.map_err(std::io::Error::other));
                let written = state.storage.upload(share, &path, &filename, byte_stream, None, max_size).await?;
                result = Some(written);
            }
            _ => {}
        }
    }

    let written = result.ok_or_else(|| DomainError::bad_request("upload", "missing 'file' field"))?;
    state.metrics.record_upload(written);
    Ok(Json(Envelope::ok(UploadResponse { bytes_written: written })))
}
