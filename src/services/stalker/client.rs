//! Stalker Portal API Client
//!
//! Authenticated calls against an endpoint validated by the handshake.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::endpoints::default_referer;
use super::error::PortalError;
use super::interpreter::{
    extract_channels, is_blocked, parse_json, parse_lenient, resolve_link, truncate,
};
use super::session::PortalSession;
use super::types::{ChannelCatalog, StreamLink};

/// Firmware image description reported by get_profile
pub const MAG_IMAGE_VERSION: &str = "ImageDescription: 0.2.18-r14-250; ImageDate: Fri Jan 15 15:20:44 EET 2016; PORTAL version: 5.1.0; API Version: JS";
pub const MAG_STB_TYPE: &str = "MAG250";
pub const MAG_SERIAL: &str = "0000000000000";

/// HTTP client shared by every portal-facing call.
///
/// Portals routinely run self-signed certificates, so verification is off.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .build()
}

/// Stalker API Client
pub struct PortalClient {
    http: Client,
    timeout: Duration,
}

impl PortalClient {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Issue an authenticated GET and return the raw body on 2xx
    async fn get(
        &self,
        session: &PortalSession,
        real_url: &str,
        params: &[(&str, &str)],
    ) -> Result<String, PortalError> {
        if session.token().is_none() {
            return Err(PortalError::MissingToken);
        }
        let headers = session.headers(&default_referer(real_url))?;

        let action = params
            .iter()
            .find(|(key, _)| *key == "action")
            .map(|(_, value)| *value)
            .unwrap_or_default();
        debug!("Stalker API request: {} -> {}", action, real_url);

        let response = self
            .http
            .get(real_url)
            .headers(headers)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if is_blocked(status.as_u16(), &body) {
            return Err(PortalError::UpstreamBlocked {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            error!(
                "Stalker {} failed with status {}: {}",
                action,
                status,
                body.chars().take(500).collect::<String>()
            );
            return Err(PortalError::Upstream {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        Ok(body)
    }

    /// Fetch the device profile; returns the upstream JSON object
    pub async fn get_profile(
        &self,
        session: &PortalSession,
        real_url: &str,
    ) -> Result<Value, PortalError> {
        let body = self
            .get(
                session,
                real_url,
                &[
                    ("type", "stb"),
                    ("action", "get_profile"),
                    ("hd", "1"),
                    ("ver", MAG_IMAGE_VERSION),
                    ("stb_type", MAG_STB_TYPE),
                    ("sn", MAG_SERIAL),
                ],
            )
            .await?;

        let json = parse_json(&body)?;
        if !json.is_object() {
            return Err(PortalError::MalformedResponse {
                reason: "profile response is not an object".to_string(),
                body: truncate(&body),
            });
        }
        Ok(json)
    }

    /// Fetch the full live channel catalog
    pub async fn get_channels(
        &self,
        session: &PortalSession,
        real_url: &str,
    ) -> Result<ChannelCatalog, PortalError> {
        let body = self
            .get(
                session,
                real_url,
                &[
                    ("type", "itv"),
                    ("action", "get_all_channels"),
                    ("force_ch_link_check", "0"),
                ],
            )
            .await?;

        let json = parse_json(&body)?;
        let channels = extract_channels(&json)?;
        debug!("Stalker catalog: {} channels", channels.len());

        Ok(ChannelCatalog {
            body: json,
            channels,
        })
    }

    /// Exchange a channel `cmd` for a playable URL
    pub async fn create_link(
        &self,
        session: &PortalSession,
        real_url: &str,
        cmd: &str,
    ) -> Result<StreamLink, PortalError> {
        let body = self
            .get(
                session,
                real_url,
                &[
                    ("type", "itv"),
                    ("action", "create_link"),
                    ("cmd", cmd),
                    ("series_number", "0"),
                    ("forced_storage", "0"),
                    ("disable_ad", "0"),
                    ("download", "0"),
                    ("force_ch_link_check", "0"),
                ],
            )
            .await?;

        let json = parse_lenient(&body);
        match resolve_link(cmd, &json) {
            Ok(resolved_url) => Ok(StreamLink {
                cmd: cmd.to_string(),
                resolved_url,
            }),
            Err(err) => {
                error!("Stalker create_link failed ({}). Response: {}", err, json);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MAC: &str = "00:1A:79:12:34:56";

    fn client() -> PortalClient {
        PortalClient::new(Client::new(), Duration::from_secs(5))
    }

    fn api_url(server: &MockServer) -> String {
        format!("{}/c/server/load.php", server.uri())
    }

    async fn mount_link_response(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/c/server/load.php"))
            .and(query_param("action", "create_link"))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_missing_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "js": {} })))
            .expect(0)
            .mount(&server)
            .await;

        let session = PortalSession::new(MAC);
        let url = api_url(&server);

        let err = client().get_channels(&session, &url).await.unwrap_err();
        assert!(matches!(err, PortalError::MissingToken));

        let err = client().get_profile(&session, &url).await.unwrap_err();
        assert!(matches!(err, PortalError::MissingToken));

        let empty = PortalSession::with_token(MAC, "");
        let err = client()
            .create_link(&empty, &url, "ffrt http://x")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::MissingToken));
    }

    #[tokio::test]
    async fn test_get_channels_sends_session_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c/server/load.php"))
            .and(query_param("type", "itv"))
            .and(query_param("action", "get_all_channels"))
            .and(query_param("force_ch_link_check", "0"))
            .and(header("authorization", "Bearer TOK"))
            .and(header("referer", format!("{}/c/", server.uri()).as_str()))
            .and(header_regex("cookie", "stoke=TOK"))
            .and(header("x-user-agent", "Model: MAG250; Link: WiFi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "js": { "total_items": 1, "data": [
                    { "id": 10, "name": "Sports", "logo": "s.png", "cmd": "ffrt http://s/10" }
                ] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = PortalSession::with_token(MAC, "TOK");
        let catalog = client()
            .get_channels(&session, &api_url(&server))
            .await
            .unwrap();

        assert_eq!(catalog.channels.len(), 1);
        assert_eq!(catalog.channels[0].id, "10");
        assert_eq!(catalog.channels[0].cmd, "ffrt http://s/10");
        assert_eq!(catalog.body["js"]["total_items"], 1);
    }

    #[tokio::test]
    async fn test_get_channels_without_list_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "js": "nope" })))
            .mount(&server)
            .await;

        let session = PortalSession::with_token(MAC, "TOK");
        let err = client()
            .get_channels(&session, &api_url(&server))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "malformed_response");
    }

    #[tokio::test]
    async fn test_get_profile_params_and_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "get_profile"))
            .and(query_param("hd", "1"))
            .and(query_param("stb_type", "MAG250"))
            .and(query_param("sn", "0000000000000"))
            .and(query_param("ver", MAG_IMAGE_VERSION))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .expect(1)
            .mount(&server)
            .await;

        let session = PortalSession::with_token(MAC, "TOK");
        let err = client()
            .get_profile(&session, &api_url(&server))
            .await
            .unwrap_err();

        match err {
            PortalError::Upstream { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_profile_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "get_profile"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "js": { "id": "1", "status": 0 } })),
            )
            .mount(&server)
            .await;

        let session = PortalSession::with_token(MAC, "TOK");
        let profile = client()
            .get_profile(&session, &api_url(&server))
            .await
            .unwrap();
        assert_eq!(profile["js"]["id"], "1");
    }

    #[tokio::test]
    async fn test_create_link_nested_cmd() {
        let server = MockServer::start().await;
        mount_link_response(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "js": { "cmd": "http://x/y.ts" } })),
        )
        .await;

        let session = PortalSession::with_token(MAC, "TOK");
        let link = client()
            .create_link(&session, &api_url(&server), "ffrt http://localhost/ch/1")
            .await
            .unwrap();

        assert_eq!(link.resolved_url, "http://x/y.ts");
        assert_eq!(link.cmd, "ffrt http://localhost/ch/1");
    }

    #[tokio::test]
    async fn test_create_link_fault_is_stream_unavailable() {
        let server = MockServer::start().await;
        mount_link_response(&server, ResponseTemplate::new(200).set_body_string("link_fault"))
            .await;

        let session = PortalSession::with_token(MAC, "TOK");
        let err = client()
            .create_link(&session, &api_url(&server), "ffrt 1")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::StreamUnavailable));
    }

    #[tokio::test]
    async fn test_create_link_falls_back_to_stream_cmd() {
        let server = MockServer::start().await;
        mount_link_response(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "js": { "id": 1 } })),
        )
        .await;

        let session = PortalSession::with_token(MAC, "TOK");
        let link = client()
            .create_link(&session, &api_url(&server), "rtmp://x")
            .await
            .unwrap();
        assert_eq!(link.resolved_url, "rtmp://x");
    }

    #[tokio::test]
    async fn test_blocked_status_surfaces() {
        let server = MockServer::start().await;
        mount_link_response(&server, ResponseTemplate::new(884)).await;

        let session = PortalSession::with_token(MAC, "TOK");
        let err = client()
            .create_link(&session, &api_url(&server), "ffrt 1")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::UpstreamBlocked { status: 884 }));
    }
}
