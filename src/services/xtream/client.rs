//! Xtream Codes API Client
//!
//! Account login against `player_api.php`.

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::types::{XtreamAuthResponse, XtreamCredentials};
use crate::services::stalker::interpreter::{is_blocked, truncate};

/// UA of a common IPTV player; some panels only answer to player clients
pub const PLAYER_USER_AGENT: &str = "IPTV Smarters Pro";

/// Xtream API Error types
#[derive(Error, Debug)]
pub enum XtreamError {
    #[error("Network error: {message}")]
    Network { message: String, timeout: bool },

    #[error("HTTP error: {status}")]
    Http { status: u16 },

    #[error("Provider blocked the request (Status {status})")]
    Blocked { status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Invalid username or password")]
    Unauthorized,

    #[error("Account is not active (status: {status})")]
    AccountInactive { status: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl XtreamError {
    /// Stable category string surfaced to API callers
    pub fn category(&self) -> &'static str {
        match self {
            XtreamError::Network { .. } => "network_error",
            XtreamError::Http { .. } => "upstream_error",
            XtreamError::Blocked { .. } => "upstream_blocked",
            XtreamError::Parse(_) | XtreamError::EmptyResponse => "malformed_response",
            XtreamError::Unauthorized => "auth_rejected",
            XtreamError::AccountInactive { .. } => "account_inactive",
            XtreamError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            XtreamError::Http { status } | XtreamError::Blocked { status } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt with a different client identity may help
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            XtreamError::Network { .. }
                | XtreamError::Http { .. }
                | XtreamError::Parse(_)
                | XtreamError::EmptyResponse
        )
    }
}

impl From<reqwest::Error> for XtreamError {
    fn from(err: reqwest::Error) -> Self {
        XtreamError::Network {
            message: err.to_string(),
            timeout: err.is_timeout(),
        }
    }
}

/// Xtream API Client
pub struct XtreamClient {
    http: Client,
    timeout: Duration,
}

impl XtreamClient {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Authenticate, first as `user_agent`, then once more as an IPTV player
    pub async fn authenticate(
        &self,
        creds: &XtreamCredentials,
        user_agent: &str,
    ) -> Result<XtreamAuthResponse, XtreamError> {
        match self.get_auth(creds, user_agent).await {
            Err(err) if err.is_retryable() && user_agent != PLAYER_USER_AGENT => {
                warn!(
                    "Xtream login via {} failed ({}), retrying as {}",
                    creds.server, err, PLAYER_USER_AGENT
                );
                self.get_auth(creds, PLAYER_USER_AGENT).await
            }
            other => other,
        }
    }

    async fn get_auth(
        &self,
        creds: &XtreamCredentials,
        user_agent: &str,
    ) -> Result<XtreamAuthResponse, XtreamError> {
        debug!("Xtream API request: auth -> {}", creds.server);

        let response = self
            .http
            .get(creds.api_url())
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "application/json, */*")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if is_blocked(status.as_u16(), &text) {
            return Err(XtreamError::Blocked {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(XtreamError::Http {
                status: status.as_u16(),
            });
        }

        let text = text.trim();
        if text.is_empty() || text == "[]" || text == "null" {
            return Err(XtreamError::EmptyResponse);
        }

        let json: Value = serde_json::from_str(text).map_err(|e| {
            error!("Failed to parse Xtream auth response: {}", e);
            debug!("Response text: {}", truncate(text));
            XtreamError::Parse(e.to_string())
        })?;
        if json.get("user_info").is_none() {
            return Err(XtreamError::Parse("user_info missing".to_string()));
        }

        let auth: XtreamAuthResponse =
            serde_json::from_value(json).map_err(|e| XtreamError::Parse(e.to_string()))?;

        if !auth.user_info.auth {
            return Err(XtreamError::Unauthorized);
        }
        if !auth.user_info.is_active() {
            return Err(XtreamError::AccountInactive {
                status: auth.user_info.status.clone(),
            });
        }

        Ok(auth)
    }
}
