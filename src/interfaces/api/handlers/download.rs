use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::common::errors::ApiResult;
use crate::domain::entities::file_info::guess_mime;
use crate::domain::entities::http_range::HttpRange;
use crate::domain::entities::permission::Operation;
use crate::interfaces::api::authz::authorize;
use crate::interfaces::api::dto::DownloadQuery;
use crate::interfaces::middleware::auth_extractor::AuthenticatedUser;
use crate::interfaces::middleware::client_ip::ClientIp;
use crate::interfaces::state::AppState;

/// Supports a single `Range: bytes=...` request per RFC 7233 (spec.md §6).
/// A zero-length source resolves to the empty range and is served as `206`
/// with an empty body and `Content-Range: bytes 0--1/0` — the documented
/// choice over `416` for that boundary case.
pub async fn download(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Query(query): Query<DownloadQuery>,
    headers: axum::http::HeaderMap,
) -> ApiResult<Response> {
    let snapshot = state.config.current();
    let share = authorize(&snapshot, &principal.name, Operation::Download, &query.root, &query.path, ip)?;

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header);

    let resp = state.storage.download(share, &query.path, range).await?;
    state.metrics.record_download(resp.range.len());

    let filename = query.path.rsplit('/').next().unwrap_or(&query.path);
    let mime = guess_mime(filename, false);
    let disposition = content_disposition(filename);

    let mut builder = Response::builder()
        .status(if range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK })
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::ACCEPT_RANGES, "bytes");

    if resp.range.is_empty() {
        builder = builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("bytes 0--1/{}", resp.range.total))
            .header(header::CONTENT_LENGTH, "0");
        return Ok(builder.body(Body::empty()).unwrap());
    }

    builder = builder
        .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", resp.range.start, resp.range.end, resp.range.total))
        .header(header::CONTENT_LENGTH, resp.range.len().to_string());

    Ok(builder.body(Body::from_stream(resp.stream)).unwrap())
}

/// Multiple ranges (`bytes=0-10,20-30`) take the first and ignore the rest
/// (spec.md §6), rather than failing to parse the whole header.
fn parse_range_header(value: &str) -> Option<HttpRange> {
    let spec = value.strip_prefix("bytes=")?;
    let first = spec.split(',').next()?.trim();
    let (start_s, end_s) = first.split_once('-')?;

    if start_s.is_empty() {
        let suffix_length: u64 = end_s.parse().ok()?;
        return Some(HttpRange::Suffix { suffix_length });
    }

    let start: u64 = start_s.parse().ok()?;
    if end_s.is_empty() {
        Some(HttpRange::Start { start })
    } else {
        let end: u64 = end_s.parse().ok()?;
        Some(HttpRange::StartEnd { start, end })
    }
}

/// RFC 5987 `filename*=UTF-8''…` with a plain `filename=` fallback for
/// clients that don't understand the extended form (spec.md §6).
fn content_disposition(filename: &str) -> HeaderValue {
    let encoded = percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    let value = format!("attachment; filename=\"{filename}\"; filename*=UTF-8''{encoded}");
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffix_range() {
        assert_eq!(parse_range_header("bytes=-500"), Some(HttpRange::Suffix { suffix_length: 500 }));
    }

    #[test]
    fn parses_start_only_range() {
        assert_eq!(parse_range_header("bytes=200-"), Some(HttpRange::Start { start: 200 }));
    }

    #[test]
    fn parses_start_end_range() {
        assert_eq!(parse_range_header("bytes=0-3"), Some(HttpRange::StartEnd { start: 0, end: 3 }));
    }

    #[test]
    fn rejects_malformed_header() {
        assert_eq!(parse_range_header("nonsense"), None);
    }
}
