use axum::extract::State;
use axum::Json;

use crate::common::errors::ApiResult;
use crate::domain::entities::permission::Operation;
use crate::interfaces::api::authz::authorize;
use crate::interfaces::api::dto::{Envelope, RenameRequest};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

pub async fn rename(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Json<Envelope>> {
    let snapshot = state.config.current();
    let share = authorize(&snapshot, &principal.name, Operation::Rename, &req.root, &req.path, ip)?;
    state.storage.rename(share, &req.path, &req.new_name).await?;
    Ok(Json(Envelope::ok_empty()))
}
