use axum::extract::State;
use axum::Json;

use crate::domain::entities::permission::Operation;
use crate::interfaces::api::authz::authorize;
use crate::interfaces::api::dto::{DeleteFailure, DeleteRequest, DeleteResponse, Envelope};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

/// Unlike the other mutating endpoints, a failure on one path does not
/// abort the batch: each path is attempted independently and the response
/// splits results into `deleted` and `failed` (spec.md §4.9).
pub async fn delete(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Json(req): Json<DeleteRequest>,
) -> Json<Envelope> {
    let snapshot = state.config.current();
    let mut deleted = Vec::new();
    let mut failed = Vec::new();

    for path in req.paths {
        match authorize(&snapshot, &principal.name, Operation::Delete, &req.root, &path, ip) {
            Ok(share) => match state.storage.delete(share, &path).await {
                Ok(()) => deleted.push(path),
                Err(e) => failed.push(DeleteFailure { path, reason: e.message }),
            },
            Err(e) => failed.push(DeleteFailure { path, reason: e.message }),
        }
    }

    Json(Envelope::ok(DeleteResponse { deleted, failed }))
}
