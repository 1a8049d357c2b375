use axum::extract::State;
use axum::routing::{any, delete, get, post, put};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::interfaces::api::dto::Envelope;
use crate::interfaces::api::handlers::{admin, delete as delete_handler, direct_transfer, download, listing, mkdir, register, rename, session, upload};
use crate::interfaces::middleware::{access_log, concurrency, exception_shield, ip_filter_layer, rate_limit};
use crate::interfaces::state::AppState;
use crate::interfaces::webdav::mount;

/// Builds the full `axum::Router` for `chfs`: `/api/*` JSON endpoints, the
/// WebDAV mount, and the plumbing endpoints (`/healthz`, `/metrics`), with
/// the middleware pipeline applied outermost-first per spec.md §4.8:
/// metrics/access-log -> exception shield -> IP filter -> rate limit ->
/// concurrency cap. Per-handler authentication happens inside each handler
/// via the `AuthenticatedUser` extractor, not as a blanket layer, since a
/// handful of routes (`/healthz`, `/api/register`) are intentionally open.
pub fn build(state: AppState) -> Router {
    let mount_path = state.config.current().webdav.mount_path.clone();
    let webdav_share = format!("{}/{{share}}", mount_path.trim_end_matches('/'));
    let webdav_share_slash = format!("{webdav_share}/");
    let webdav_share_rest = format!("{webdav_share}/{{*rest}}");

    let api = Router::new()
        .route("/session", get(session::session))
        .route("/register", post(register::register))
        .route("/list", get(listing::list))
        .route("/mkdir", post(mkdir::mkdir))
        .route("/rename", post(rename::rename))
        .route("/delete", post(delete_handler::delete))
        .route("/upload", post(upload::upload))
        .route("/download", get(download::download))
        .route("/direct-transfer/recipients", get(direct_transfer::recipients))
        .route("/direct-transfer/send", post(direct_transfer::send))
        .route("/direct-transfer/list", get(direct_transfer::list))
        .route("/direct-transfer/download/{id}", get(direct_transfer::download))
        .route("/direct-transfer/{id}", delete(direct_transfer::delete))
        .route("/admin/status", get(admin::status))
        .route("/admin/shares/{share_name}/quota", put(admin::set_quota))
        .route("/admin/server/custom-urls", put(admin::set_custom_urls))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{username}", delete(admin::remove_user));

    let webdav = Router::new()
        .route(&webdav_share, any(mount::handle))
        .route(&webdav_share_slash, any(mount::handle))
        .route(&webdav_share_rest, any(mount::handle_with_path));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .merge(webdav)
        .layer(middleware::from_fn_with_state(state.clone(), concurrency::concurrency_cap))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), ip_filter_layer::ip_filter))
        .layer(exception_shield::layer(state.metrics.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), access_log::access_log))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Json<Envelope> {
    Json(Envelope::ok(state.metrics.snapshot()))
}
