use axum::extract::State;
use axum::Json;

use crate::common::errors::{ApiResult, DomainError};
use crate::domain::entities::user::User;
use crate::interfaces::api::dto::{Envelope, RegisterRequest};
use crate::interfaces::state::AppState;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

/// Open to anonymous callers when `server.registration_enabled` (spec.md
/// §4.9, §9): creates a dynamic user with the default full-access rule.
pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> ApiResult<Json<Envelope>> {
    let snapshot = state.config.current();
    if !snapshot.registration_enabled {
        return Err(DomainError::forbidden("register", "registration is disabled").into());
    }
    if req.username.len() < MIN_USERNAME_LEN {
        return Err(DomainError::bad_request("register", format!("username must be at least {MIN_USERNAME_LEN} characters")).into());
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(DomainError::bad_request("register", format!("password must be at least {MIN_PASSWORD_LEN} characters")).into());
    }
    if req.password != req.confirm {
        return Err(DomainError::bad_request("register", "password and confirmation do not match").into());
    }
    if snapshot.user(&req.username).is_some() {
        return Err(DomainError::conflict("register", format!("username '{}' already taken", req.username)).into());
    }

    let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| DomainError::internal_error("register", e.to_string()))?;
    let user = User { name: req.username, pass_hash: hash, is_bcrypt: true, rules: Vec::new(), dynamic: true };
    state.config.register_dynamic_user(user).await?;

    Ok(Json(Envelope::ok_empty()))
}
