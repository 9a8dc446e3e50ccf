use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::models::Playlist;
use crate::routes::proxy::{forwarded_header, is_valid_http_url};
use crate::services::m3u_parser::{check_content, fetch_playlist, parse_m3u, PlaylistError};
use crate::AppState;

#[derive(Deserialize)]
pub struct PlaylistQuery {
    #[serde(default)]
    pub url: String,
}

type ApiError = (StatusCode, Json<Value>);

pub(crate) fn playlist_error(err: PlaylistError) -> ApiError {
    let status = match &err {
        PlaylistError::Blocked { .. } => StatusCode::FORBIDDEN,
        PlaylistError::Network { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
        PlaylistError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PlaylistError::Empty => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    let mut body = json!({ "error": err.to_string() });
    if let Some(upstream) = err.upstream_status() {
        body["upstreamStatus"] = json!(upstream);
    }
    (status, Json(body))
}

/// GET /api/playlist?url=<encoded> - Fetch and parse an M3U playlist
pub async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlaylistQuery>,
    headers: HeaderMap,
) -> Result<Json<Playlist>, ApiError> {
    if !is_valid_http_url(&query.url) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid playlist URL" })),
        ));
    }

    let user_agent = forwarded_header(&headers, "x-user-agent")
        .unwrap_or_else(|| state.config.user_agent.clone());
    let referer = forwarded_header(&headers, "x-referer");

    let result = async {
        let content = fetch_playlist(
            &state.proxy_http,
            &query.url,
            &user_agent,
            referer.as_deref(),
            Duration::from_millis(state.config.proxy_timeout_ms),
            state.config.max_playlist_bytes(),
        )
        .await?;
        check_content(&content)?;
        parse_m3u(&content)
    }
    .await;

    match result {
        Ok(playlist) => {
            tracing::info!("Parsed {} playlist items from {}", playlist.items.len(), query.url);
            metrics::PROXY_REQUESTS
                .with_label_values(&["playlist", "ok"])
                .inc();
            Ok(Json(playlist))
        }
        Err(err) => {
            tracing::warn!("Playlist fetch failed for {}: {}", query.url, err);
            metrics::PROXY_REQUESTS
                .with_label_values(&["playlist", "error"])
                .inc();
            Err(playlist_error(err))
        }
    }
}
