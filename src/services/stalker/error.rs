//! Stalker Portal Error types

use serde_json::Value;
use thiserror::Error;

/// Why a handshake gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionCause {
    /// Every candidate endpoint was tried and failed
    AllCandidatesFailed,
    /// The caller's deadline or cancellation fired between attempts
    Cancelled,
}

/// Errors produced while talking to a Stalker portal
#[derive(Error, Debug)]
pub enum PortalError {
    /// Timeout or connection failure
    #[error("Network error: {message}")]
    Network { message: String, timeout: bool },

    /// 403 that survived the cookie-priming retry
    #[error("Portal rejected the device (HTTP {status})")]
    AuthRejected { status: u16 },

    /// Non-standard blocking signature (HTTP 884 and friends)
    #[error("Provider blocked the request (Status {status})")]
    UpstreamBlocked { status: u16 },

    /// Non-2xx status from the portal
    #[error("HTTP error: {status}")]
    Upstream { status: u16, body: String },

    /// Body did not match any expected shape
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String, body: String },

    /// Authenticated call attempted without a session token
    #[error("Token required")]
    MissingToken,

    /// Portal answered with the `link_fault` sentinel
    #[error("Stream unavailable (link_fault)")]
    StreamUnavailable,

    /// create_link returned nothing usable
    #[error("Failed to generate link")]
    LinkResolutionFailed { body: Value },

    /// Terminal handshake failure
    #[error("{}", exhausted_message(.cause, .last))]
    HandshakeExhausted {
        cause: ExhaustionCause,
        last: Option<Box<PortalError>>,
    },

    /// Input that can't be turned into a request (bad header value, bad URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

fn exhausted_message(cause: &ExhaustionCause, last: &Option<Box<PortalError>>) -> String {
    let head = match *cause {
        ExhaustionCause::AllCandidatesFailed => "All candidate URLs failed",
        ExhaustionCause::Cancelled => "Handshake cancelled before a candidate succeeded",
    };
    match last {
        Some(err) => format!("{}: {}", head, err),
        None => head.to_string(),
    }
}

impl PortalError {
    /// Stable category string surfaced to API callers
    pub fn category(&self) -> &'static str {
        match self {
            PortalError::Network { .. } => "network_error",
            PortalError::AuthRejected { .. } => "auth_rejected",
            PortalError::UpstreamBlocked { .. } => "upstream_blocked",
            PortalError::Upstream { .. } => "upstream_error",
            PortalError::MalformedResponse { .. } => "malformed_response",
            PortalError::MissingToken => "missing_token",
            PortalError::StreamUnavailable => "stream_unavailable",
            PortalError::LinkResolutionFailed { .. } => "link_resolution_failed",
            PortalError::HandshakeExhausted { .. } => "handshake_exhausted",
            PortalError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// HTTP status reported by the portal, when one was received
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            PortalError::AuthRejected { status }
            | PortalError::UpstreamBlocked { status }
            | PortalError::Upstream { status, .. } => Some(*status),
            PortalError::HandshakeExhausted { last: Some(last), .. } => last.upstream_status(),
            _ => None,
        }
    }

    /// Raw upstream payload for diagnostics
    pub fn details(&self) -> Option<Value> {
        match self {
            PortalError::Upstream { body, .. } | PortalError::MalformedResponse { body, .. } => {
                Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone())))
            }
            PortalError::LinkResolutionFailed { body } => Some(body.clone()),
            PortalError::HandshakeExhausted { last: Some(last), .. } => last.details(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "Connection timeout - server did not respond".to_string()
        } else if err.is_connect() {
            "Connection failed - server unreachable".to_string()
        } else {
            format!("Request failed: {}", err)
        };
        PortalError::Network {
            message,
            timeout: err.is_timeout(),
        }
    }
}
