use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use dav_server::fakels::FakeLs;
use dav_server::localfs::LocalFs;
use dav_server::DavHandler;
use xmltree::{Element, XMLNode};

use crate::common::errors::{ApiError, DomainError, ErrorKind};
use crate::domain::entities::permission::Operation;
use crate::domain::services::rule_evaluator;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

/// WebDAV authorization runs the Rule Evaluator once per request against
/// the request method's mapped [`Operation`] (and, for `MOVE`, a second
/// check against the source path) before delegating to `dav-server`. A
/// single top-level check can't see which children a `PROPFIND` response
/// names, so `207 Multi-Status` responses are additionally post-processed
/// by [`filter_propfind_response`] to drop children the caller's rules
/// deny `Read` on (spec.md §4.10).
pub async fn handle(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(share_name): Path<String>,
    req: Request,
) -> Response {
    serve(state, ip, share_name, req).await
}

pub async fn handle_with_path(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path((share_name, _rest)): Path<(String, String)>,
    req: Request,
) -> Response {
    serve(state, ip, share_name, req).await
}

async fn serve(state: AppState, ip: std::net::IpAddr, share_name: String, req: Request) -> Response {
    let snapshot = state.config.current();

    let auth_header = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let principal = match state.auth.authenticate(&snapshot, auth_header) {
        Some(p) => p,
        None => return ApiError(DomainError::new(ErrorKind::AuthRequired, "webdav", "authentication required")).into_response(),
    };

    let Some(share) = snapshot.share(&share_name) else {
        return ApiError(DomainError::not_found("webdav", format!("unknown share '{share_name}'"))).into_response();
    };

    let mount_prefix = format!("{}/{}", snapshot.webdav.mount_path.trim_end_matches('/'), share_name);
    let rel = req.uri().path().strip_prefix(&mount_prefix).unwrap_or("/").trim_start_matches('/');

    let op = match method_operation(req.method()) {
        Some(op) => op,
        None => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    if let Err(e) = rule_evaluator::evaluate(&snapshot.rules, Some(&principal.name), op, &share_name, rel, ip) {
        return ApiError(DomainError::from(e)).into_response();
    }

    if req.method() == Method::from_bytes(b"MOVE").unwrap() {
        if let Err(e) = rule_evaluator::evaluate(&snapshot.rules, Some(&principal.name), Operation::Delete, &share_name, rel, ip) {
            return ApiError(DomainError::from(e)).into_response();
        }
    }
    if let Some(dest_rel) = destination_rel(&req, &mount_prefix) {
        if let Err(e) = rule_evaluator::evaluate(&snapshot.rules, Some(&principal.name), Operation::Upload, &share_name, &dest_rel, ip) {
            return ApiError(DomainError::from(e)).into_response();
        }
    }

    let mut builder = DavHandler::builder()
        .filesystem(LocalFs::new(&share.path, false, false, false))
        .strip_prefix(mount_prefix.clone());
    if snapshot.webdav.lock_system_enabled {
        builder = builder.locksystem(FakeLs::new());
    }
    let dav = builder.build_handler();

    let is_propfind = req.method() == Method::from_bytes(b"PROPFIND").unwrap();

    let resp = dav.handle(req).await.map(Body::new);

    if is_propfind && resp.status() == StatusCode::MULTI_STATUS {
        return filter_propfind_response(resp, &snapshot.rules, &principal.name, &share_name, &mount_prefix, ip)
            .await
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    resp
}

/// Drops `<response>` elements from a `207 Multi-Status` `PROPFIND` body
/// whose `<href>` names a child the caller's rules deny `Read` on. The
/// directory entry itself (href == the requested path) is always kept —
/// only its listed children are filtered, matching the per-child check
/// `GET /api/list` applies (spec.md §4.10).
async fn filter_propfind_response(
    resp: Response,
    rules: &[crate::domain::entities::rule::Rule],
    username: &str,
    share_name: &str,
    mount_prefix: &str,
    ip: std::net::IpAddr,
) -> Result<Response, ()> {
    let (parts, body) = resp.into_parts();
    let bytes = axum::body::to_bytes(body, 16 * 1024 * 1024).await.map_err(|_| ())?;

    let mut root = match Element::parse(&bytes[..]) {
        Ok(root) if root.name == "multistatus" => root,
        _ => return Ok(Response::from_parts(parts, Body::from(bytes))),
    };

    root.children.retain(|node| {
        let XMLNode::Element(el) = node else { return true };
        if el.name != "response" {
            return true;
        }
        let Some(href) = response_href(el) else { return true };
        let rel = href.strip_prefix(mount_prefix).unwrap_or(&href).trim_start_matches('/');
        rule_evaluator::evaluate(rules, Some(username), Operation::Download, share_name, rel, ip).is_ok()
    });

    let mut out = Vec::new();
    root.write(&mut out).map_err(|_| ())?;

    let len = HeaderValue::from_str(&out.len().to_string()).map_err(|_| ())?;
    let mut rebuilt = Response::from_parts(parts, Body::from(out));
    rebuilt.headers_mut().insert(header::CONTENT_LENGTH, len);
    Ok(rebuilt)
}

/// Extracts a `<response>` element's `<href>` text content, tolerating any
/// XML namespace prefix `dav-server` emits (it matches on local name only).
fn response_href(response: &Element) -> Option<String> {
    let href_el = response.children.iter().find_map(|n| match n {
        XMLNode::Element(el) if el.name == "href" => Some(el),
        _ => None,
    })?;
    let text: String = href_el
        .children
        .iter()
        .filter_map(|n| match n {
            XMLNode::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    let decoded = percent_encoding::percent_decode_str(&text).decode_utf8().ok()?.into_owned();
    Some(decoded)
}

/// `PROPFIND`/`GET`/`HEAD`/`OPTIONS` -> read, `PUT`/`MKCOL`/`PROPPATCH` ->
/// write, `DELETE`/`MOVE`(source) -> delete, `COPY`/`MOVE`(destination) ->
/// write (checked separately via the `Destination` header).
fn method_operation(method: &Method) -> Option<Operation> {
    match method.as_str() {
        "GET" | "HEAD" | "PROPFIND" | "OPTIONS" => Some(Operation::Download),
        "PUT" | "MKCOL" | "PROPPATCH" => Some(Operation::Upload),
        "DELETE" => Some(Operation::Delete),
        "COPY" | "MOVE" => Some(Operation::CopyMove),
        _ => None,
    }
}

fn destination_rel(req: &Request, mount_prefix: &str) -> Option<String> {
    let dest = req.headers().get("Destination")?.to_str().ok()?;
    let path = url::Url::parse(dest).map(|u| u.path().to_string()).unwrap_or_else(|_| dest.to_string());
    Some(path.strip_prefix(mount_prefix).unwrap_or("/").trim_start_matches('/').to_string())
}
