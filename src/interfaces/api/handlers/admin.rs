use axum::extract::{Path, State};
use axum::Json;

use crate::common::errors::{ApiResult, DomainError};
use crate::interfaces::api::dto::{AdminStatusResponse, AdminUserEntry, AdminUsersResponse, CustomUrlsRequest, Envelope, QuotaRequest, ShareStatus};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

/// Every handler in this module is local-admin-only: authenticated AND
/// originating from loopback (spec.md §4.7, §4.9).
fn require_local(state: &AppState, ip: std::net::IpAddr) -> Result<(), DomainError> {
    state.auth.require_local_admin(ip)
}

pub async fn status(
    State(state): State<AppState>,
    AuthenticatedUser(_principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
) -> ApiResult<Json<Envelope>> {
    require_local(&state, ip)?;
    let snapshot = state.config.current();

    let mut shares = Vec::with_capacity(snapshot.shares.len());
    for share in &snapshot.shares {
        let used = state.quota.get_usage(share, false).await?;
        shares.push(ShareStatus { name: share.name.clone(), quota: state.quota.describe(share, used) });
    }

    Ok(Json(Envelope::ok(AdminStatusResponse {
        shares,
        users: snapshot.users.iter().map(|u| u.name.clone()).collect(),
        custom_urls: snapshot.custom_urls.clone(),
        metrics: state.metrics.snapshot(),
    })))
}

pub async fn set_quota(
    State(state): State<AppState>,
    AuthenticatedUser(_principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(share_name): Path<String>,
    Json(req): Json<QuotaRequest>,
) -> ApiResult<Json<Envelope>> {
    require_local(&state, ip)?;
    state.config.set_share_quota(&share_name, req.resolved()).await?;
    Ok(Json(Envelope::ok_empty()))
}

pub async fn set_custom_urls(
    State(state): State<AppState>,
    AuthenticatedUser(_principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Json(req): Json<CustomUrlsRequest>,
) -> ApiResult<Json<Envelope>> {
    require_local(&state, ip)?;
    state.config.set_custom_urls(req.urls).await?;
    Ok(Json(Envelope::ok_empty()))
}

pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(_principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
) -> ApiResult<Json<Envelope>> {
    require_local(&state, ip)?;
    let snapshot = state.config.current();
    let users = snapshot
        .users
        .iter()
        .map(|u| AdminUserEntry { name: u.name.clone(), dynamic: u.dynamic })
        .collect();
    Ok(Json(Envelope::ok(AdminUsersResponse { users })))
}

/// Removing yourself is rejected even though you are the authenticated
/// admin: the endpoint distrusts same-principal deletes to avoid an admin
/// locking themselves out.
pub async fn remove_user(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(username): Path<String>,
) -> ApiResult<Json<Envelope>> {
    require_local(&state, ip)?;
    if username == principal.name {
        return Err(DomainError::bad_request("admin", "cannot remove your own account").into());
    }
    let removed = state.config.remove_dynamic_user(&username).await?;
    if !removed {
        return Err(DomainError::not_found("admin", format!("unknown dynamic user '{username}'")).into());
    }
    Ok(Json(Envelope::ok_empty()))
}
