use axum::extract::{Query, State};
use axum::Json;

use crate::common::errors::ApiResult;
use crate::domain::entities::permission::Operation;
use crate::interfaces::api::authz::authorize;
use crate::interfaces::api::dto::{Envelope, ListQuery, ListResponse};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Envelope>> {
    let snapshot = state.config.current();
    let share = authorize(&snapshot, &principal.name, Operation::List, &query.root, &query.path, ip)?;
    let files = state.storage.list(share, &query.path).await?;
    Ok(Json(Envelope::ok(ListResponse { files })))
}
