use axum::extract::State;
use axum::Json;

use crate::common::errors::ApiResult;
use crate::domain::entities::permission::Operation;
use crate::interfaces::api::authz::authorize;
use crate::interfaces::api::dto::{Envelope, MkdirRequest};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

pub async fn mkdir(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Json(req): Json<MkdirRequest>,
) -> ApiResult<Json<Envelope>> {
    let snapshot = state.config.current();
    let share = authorize(&snapshot, &principal.name, Operation::Mkdir, &req.root, &req.path, ip)?;
    state.storage.mkdir(share, &req.path).await?;
    Ok(Json(Envelope::ok_empty()))
}
