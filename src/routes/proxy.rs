use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::services::stalker::interpreter::BLOCKED_STATUS;
use crate::AppState;

// Re-export reqwest header module to avoid version conflicts
mod reqwest_header {
    pub use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER, USER_AGENT};
}

/// Query parameters for the byte proxy
#[derive(Deserialize)]
pub struct ProxyQuery {
    #[serde(default)]
    pub url: String,
}

type ApiError = (StatusCode, Json<Value>);

/// Validate URL is HTTP/HTTPS
pub fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Caller-supplied override header (`X-User-Agent`, `X-Referer`)
pub fn forwarded_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn record(outcome: &str) {
    metrics::PROXY_REQUESTS
        .with_label_values(&["proxy", outcome])
        .inc();
}

/// GET /api/proxy?url=<encoded>
/// Byte passthrough for playlists and other resources the browser can't fetch cross-origin.
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !is_valid_http_url(&query.url) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing URL parameter" })),
        ));
    }

    let user_agent = forwarded_header(&headers, "x-user-agent")
        .unwrap_or_else(|| state.config.user_agent.clone());

    let mut request = state
        .proxy_http
        .get(&query.url)
        .header(reqwest_header::USER_AGENT, user_agent)
        .header(reqwest_header::ACCEPT, "*/*");
    if let Some(referer) = forwarded_header(&headers, "x-referer") {
        request = request.header(reqwest_header::REFERER, referer);
    }

    // Only the wait for response headers is bounded; the body may stream for as long as it lasts
    let header_timeout = Duration::from_millis(state.config.proxy_timeout_ms);
    let upstream_response = match tokio::time::timeout(header_timeout, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let status = if e.is_timeout() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            tracing::error!("Proxy error for {}: {}", query.url, e);
            record("network_error");
            return Err((
                status,
                Json(json!({
                    "error": "Failed to fetch resource",
                    "details": e.to_string(),
                })),
            ));
        }
        Err(_) => {
            tracing::error!("Proxy timed out waiting for {}", query.url);
            record("timeout");
            return Err((
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({
                    "error": "Failed to fetch resource",
                    "details": format!("No response within {}ms", state.config.proxy_timeout_ms),
                })),
            ));
        }
    };

    let upstream_status = upstream_response.status().as_u16();

    if upstream_status == BLOCKED_STATUS {
        tracing::error!("Upstream returned 884 (Blocked/Forbidden) for {}", query.url);
        record("blocked");
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Provider blocked the request (Status 884)",
                "details": "The IPTV provider blocked the connection. Try using a VPN or different network.",
                "upstreamStatus": BLOCKED_STATUS,
            })),
        ));
    }

    if upstream_status >= 500 {
        tracing::error!("Upstream status {} for {}", upstream_status, query.url);
        record("upstream_error");
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Failed to fetch resource",
                "details": format!("Upstream returned HTTP {}", upstream_status),
                "upstreamStatus": upstream_status,
            })),
        ));
    }

    let content_type = upstream_response
        .headers()
        .get(reqwest_header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| HeaderValue::from_str(s).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    record("ok");

    // Stream the body back
    let body = Body::from_stream(upstream_response.bytes_stream());

    Response::builder()
        .status(StatusCode::from_u16(upstream_status).unwrap_or(StatusCode::OK))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(body)
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal error" })),
            )
        })
}
