use axum::extract::State;
use axum::Json;

use crate::domain::services::rule_evaluator;
use crate::interfaces::api::dto::{Envelope, SessionResponse};
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

pub async fn session(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
) -> Json<Envelope> {
    let snapshot = state.config.current();
    let roots = rule_evaluator::accessible_roots(&snapshot.rules, &principal.name, ip, &snapshot.share_names());
    Json(Envelope::ok(SessionResponse { principal: principal.name, roots }))
}
