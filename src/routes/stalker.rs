//! Stalker Portal Control Route
//!
//! Single query-style entry point used by the frontend:
//! `GET /api/stalker?action=<handshake|get_profile|get_channels|create_link>&mac=..&url=..`

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::services::stalker::{
    api_url_for_calls, generate_candidates, ExhaustionCause, PortalError, PortalSession,
};
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct StalkerQuery {
    pub action: Option<String>,
    pub mac: Option<String>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub cmd: Option<String>,
}

type ApiError = (StatusCode, Json<Value>);

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// HTTP status for a portal failure
fn status_for(err: &PortalError) -> StatusCode {
    match err {
        PortalError::MissingToken | PortalError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PortalError::UpstreamBlocked { .. } => StatusCode::FORBIDDEN,
        PortalError::StreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        PortalError::LinkResolutionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        PortalError::Upstream { status, .. } if (400..=599).contains(status) => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        PortalError::Network { timeout: true, .. } => StatusCode::GATEWAY_TIMEOUT,
        PortalError::HandshakeExhausted {
            cause: ExhaustionCause::Cancelled,
            ..
        } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn portal_error(err: PortalError) -> ApiError {
    let mut body = json!({
        "error": err.to_string(),
        "category": err.category(),
    });
    if let Some(status) = err.upstream_status() {
        body["upstreamStatus"] = json!(status);
    }
    if let Some(details) = err.details() {
        body["details"] = details;
    }
    (status_for(&err), Json(body))
}

/// GET /api/stalker
pub async fn stalker_api(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StalkerQuery>,
) -> Result<Json<Value>, ApiError> {
    let (Some(action), Some(mac), Some(url)) = (
        non_empty(query.action),
        non_empty(query.mac),
        non_empty(query.url),
    ) else {
        return Err(bad_request("Missing required parameters"));
    };

    let result = match action.as_str() {
        "handshake" => handshake(&state, &mac, &url).await,
        "get_profile" => {
            let session = PortalSession::with_token(&mac, query.token.unwrap_or_default());
            state
                .portal
                .get_profile(&session, &api_url_for_calls(&url))
                .await
        }
        "get_channels" => {
            let session = PortalSession::with_token(&mac, query.token.unwrap_or_default());
            state
                .portal
                .get_channels(&session, &api_url_for_calls(&url))
                .await
                .map(|catalog| catalog.body)
        }
        "create_link" => {
            let Some(cmd) = non_empty(query.cmd) else {
                return Err(bad_request("Token and cmd required"));
            };
            let session = PortalSession::with_token(&mac, query.token.unwrap_or_default());
            state
                .portal
                .create_link(&session, &api_url_for_calls(&url), &cmd)
                .await
                .map(|link| json!({ "url": link.resolved_url }))
        }
        _ => return Err(bad_request("Invalid action")),
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.category(),
    };
    metrics::PORTAL_CALLS
        .with_label_values(&[action.as_str(), outcome])
        .inc();

    result.map(Json).map_err(|err| {
        tracing::error!("Stalker API error for {} ({}): {}", url, action, err);
        portal_error(err)
    })
}

/// Probe the portal and echo the handshake body with the working URL
async fn handshake(state: &AppState, mac: &str, url: &str) -> Result<Value, PortalError> {
    let candidates = generate_candidates(url);
    tracing::info!("Probing {} candidates for {}", candidates.len(), url);

    let cancel = CancellationToken::new();
    let deadline = state.config.handshake_deadline_ms.map(|ms| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            cancel.cancel();
        })
    });

    let mut session = PortalSession::new(mac);
    let result = state
        .prober
        .handshake(&mut session, &candidates, &cancel)
        .await;

    if let Some(timer) = deadline {
        timer.abort();
    }

    let result = result?;
    let mut body = result.body;
    if let Some(map) = body.as_object_mut() {
        map.insert("real_url".to_string(), Value::String(result.real_url));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MAC: &str = "00:1A:79:12:34:56";

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default()).unwrap())
    }

    fn query(action: &str, url: &str) -> StalkerQuery {
        StalkerQuery {
            action: Some(action.to_string()),
            mac: Some(MAC.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let err = stalker_api(State(state()), Query(StalkerQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = stalker_api(State(state()), Query(query("reboot", "http://x")))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1 .0["error"], "Invalid action");
    }

    #[tokio::test]
    async fn test_get_channels_without_token_is_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = stalker_api(State(state()), Query(query("get_channels", &server.uri())))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1 .0["category"], "missing_token");
    }

    #[tokio::test]
    async fn test_handshake_echoes_real_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c/server/load.php"))
            .and(query_param("action", "handshake"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "js": { "token": "T" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/c/", server.uri());
        let Json(body) = stalker_api(State(state()), Query(query("handshake", &url)))
            .await
            .unwrap();

        assert_eq!(body["js"]["token"], "T");
        assert_eq!(
            body["real_url"],
            format!("{}/c/server/load.php", server.uri())
        );
    }

    #[tokio::test]
    async fn test_create_link_offline_is_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c/server/load.php"))
            .and(query_param("action", "create_link"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "js": { "error": "link_fault" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut q = query("create_link", &format!("{}/c/server/load.php", server.uri()));
        q.token = Some("T".to_string());
        q.cmd = Some("ffrt 12".to_string());

        let err = stalker_api(State(state()), Query(q)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.1 .0["category"], "stream_unavailable");
    }

    #[tokio::test]
    async fn test_handshake_deadline_is_gateway_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c/server/load.php"))
            .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "js": { "token": "T" } })),
            )
            .expect(0)
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.handshake_deadline_ms = Some(50);
        let state = Arc::new(AppState::new(config).unwrap());

        let url = format!("{}/c/", server.uri());
        let err = stalker_api(State(state), Query(query("handshake", &url)))
            .await
            .unwrap_err();

        assert_eq!(err.0, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.1 .0["category"], "handshake_exhausted");
        assert_eq!(err.1 .0["upstreamStatus"], 500);
    }
}
