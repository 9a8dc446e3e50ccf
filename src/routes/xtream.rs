//! Xtream Codes Login Route
//!
//! `GET /api/xtream/login?host=..&username=..&password=..[&playlist=true]`
//! checks the account and hands back the `get.php` playlist URL, optionally
//! with the playlist already fetched and parsed.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::models::Playlist;
use crate::routes::playlist::playlist_error;
use crate::services::m3u_parser::{check_content, fetch_playlist, parse_m3u};
use crate::services::xtream::{XtreamCredentials, XtreamError, XtreamServerInfo, XtreamUserInfo};
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct XtreamLoginQuery {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Also download and parse the playlist
    #[serde(default)]
    pub playlist: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XtreamLoginResponse {
    pub user_info: XtreamUserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<XtreamServerInfo>,
    pub playlist_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist: Option<Playlist>,
}

type ApiError = (StatusCode, Json<Value>);

fn xtream_error(err: XtreamError) -> ApiError {
    let status = match &err {
        XtreamError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        XtreamError::Unauthorized => StatusCode::UNAUTHORIZED,
        XtreamError::AccountInactive { .. } | XtreamError::Blocked { .. } => StatusCode::FORBIDDEN,
        XtreamError::Network { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    let mut body = json!({
        "error": err.to_string(),
        "category": err.category(),
    });
    if let Some(upstream) = err.upstream_status() {
        body["upstreamStatus"] = json!(upstream);
    }
    (status, Json(body))
}

fn record(outcome: &str) {
    metrics::PORTAL_CALLS
        .with_label_values(&["xtream_login", outcome])
        .inc();
}

/// GET /api/xtream/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<XtreamLoginQuery>,
) -> Result<Json<XtreamLoginResponse>, ApiError> {
    let creds = XtreamCredentials::new(&query.host, query.username.trim(), &query.password)
        .map_err(|err| {
            record(err.category());
            xtream_error(err)
        })?;

    let auth = state
        .xtream
        .authenticate(&creds, &state.config.user_agent)
        .await
        .map_err(|err| {
            tracing::warn!("Xtream login failed for {}: {}", creds.server, err);
            record(err.category());
            xtream_error(err)
        })?;

    let playlist_url = creds.playlist_url().to_string();
    tracing::info!("Xtream login ok for {} as {}", creds.server, creds.username);

    let playlist = if query.playlist {
        let result = async {
            let content = fetch_playlist(
                &state.proxy_http,
                &playlist_url,
                &state.config.user_agent,
                None,
                Duration::from_millis(state.config.proxy_timeout_ms),
                state.config.max_playlist_bytes(),
            )
            .await?;
            check_content(&content)?;
            parse_m3u(&content)
        }
        .await;

        match result {
            Ok(playlist) => Some(playlist),
            Err(err) => {
                tracing::warn!("Xtream playlist fetch failed for {}: {}", creds.server, err);
                record("playlist_error");
                return Err(playlist_error(err));
            }
        }
    } else {
        None
    };

    record("ok");
    Ok(Json(XtreamLoginResponse {
        user_info: auth.user_info,
        server_info: auth.server_info,
        playlist_url,
        playlist,
    }))
}
