//! Xtream Codes API Types
//!
//! Account types returned by `player_api.php` and the credentials used to
//! build it and the `get.php` playlist URL.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use super::client::XtreamError;

/// Playlist flavour requested from `get.php`
const PLAYLIST_TYPE: &str = "m3u_plus";
const PLAYLIST_OUTPUT: &str = "ts";

/// Login credentials for an Xtream panel
#[derive(Debug, Clone)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: Url,
    pub username: String,
    pub password: String,
}

impl XtreamCredentials {
    /// Normalise the host (default scheme `http://`, no trailing slash)
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self, XtreamError> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() || username.is_empty() || password.is_empty() {
            return Err(XtreamError::InvalidRequest(
                "host, username and password are required".to_string(),
            ));
        }

        let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        let server = Url::parse(&format!("{}/", with_scheme))
            .map_err(|e| XtreamError::InvalidRequest(format!("invalid host: {}", e)))?;

        Ok(Self {
            server,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn endpoint(&self, script: &str) -> Url {
        let mut url = self.server.clone();
        url.set_path(&format!("{}{}", url.path(), script));
        url.query_pairs_mut()
            .append_pair("username", &self.username)
            .append_pair("password", &self.password);
        url
    }

    /// player_api.php authentication URL
    pub fn api_url(&self) -> Url {
        self.endpoint("player_api.php")
    }

    /// get.php URL for the full M3U playlist
    pub fn playlist_url(&self) -> Url {
        let mut url = self.endpoint("get.php");
        url.query_pairs_mut()
            .append_pair("type", PLAYLIST_TYPE)
            .append_pair("output", PLAYLIST_OUTPUT);
        url
    }
}

/// Authentication response from player_api.php (no action)
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamAuthResponse {
    pub user_info: XtreamUserInfo,
    #[serde(default)]
    pub server_info: Option<XtreamServerInfo>,
}

/// User account information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamUserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default, deserialize_with = "flag")]
    pub auth: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub exp_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub is_trial: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub active_cons: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_connections: Option<String>,
    #[serde(default)]
    pub allowed_output_formats: Vec<String>,
}

impl XtreamUserInfo {
    /// Panels omit `status` on some builds; only an explicit non-active value counts
    pub fn is_active(&self) -> bool {
        self.status.is_empty() || self.status.eq_ignore_ascii_case("active")
    }
}

/// Server information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamServerInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub port: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub https_port: Option<String>,
    #[serde(default)]
    pub server_protocol: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub timestamp_now: Option<i64>,
    #[serde(default)]
    pub time_now: Option<String>,
}

/// Panels send numbers, strings or null for the same field
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// `auth` arrives as 1, "1" or true
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.trim() == "1",
        _ => false,
    })
}
