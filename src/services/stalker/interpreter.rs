//! Portal response interpretation
//!
//! Portals disagree on where they put things: the token may sit under `js`
//! or at the top level, `cmd` likewise, and errors arrive as bare strings,
//! `error` fields or `js.error`. Each lookup here is an ordered list of
//! accessor paths tried in sequence.

use serde_json::Value;

use super::error::PortalError;
use super::types::RawChannelEntry;

/// Status some providers answer with when they block a client
pub const BLOCKED_STATUS: u16 = 884;

/// Sentinel meaning the channel is currently offline
pub const LINK_FAULT: &str = "link_fault";

/// Schemes a raw `cmd` may already carry when it is directly playable
const STREAM_SCHEMES: &[&str] = &["http", "rtmp", "rtsp"];

/// Player hints portals prefix to stream URLs (`ffmpeg http://...`)
const PLAYER_PREFIXES: &[&str] = &["ffmpeg ", "ffrt ", "auto "];

const TOKEN_PATHS: &[&[&str]] = &[&["js", "token"], &["token"]];
const CMD_PATHS: &[&[&str]] = &[&["cmd"], &["js", "cmd"]];
const LINK_FAULT_PATHS: &[&[&str]] = &[&[], &["error"], &["js", "error"]];
const CHANNEL_LIST_PATHS: &[&[&str]] = &[&["js", "data"]];

/// Walk `path` into `value`; the empty path is the value itself
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// First non-empty string found along `paths`
fn first_string<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Status/body pair that signals deliberate provider blocking
pub fn is_blocked(status: u16, body: &str) -> bool {
    status == BLOCKED_STATUS || body.contains("Error 884")
}

/// Strict JSON parse used for profile/channel/handshake bodies
pub fn parse_json(body: &str) -> Result<Value, PortalError> {
    serde_json::from_str(body).map_err(|e| PortalError::MalformedResponse {
        reason: format!("Invalid JSON response: {}", e),
        body: truncate(body),
    })
}

/// Lenient parse for create_link: bare text becomes a JSON string
pub fn parse_lenient(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.trim().to_string()))
}

/// Session token from a handshake body
pub fn extract_token(body: &Value) -> Option<&str> {
    if !body.is_object() {
        return None;
    }
    first_string(body, TOKEN_PATHS)
}

/// Stream URL from a create_link body, with any player hint removed.
///
/// A value that is nothing but a hint (`"ffmpeg "`) counts as absent.
pub fn extract_cmd(body: &Value) -> Option<&str> {
    CMD_PATHS
        .iter()
        .filter_map(|path| lookup(body, path))
        .filter_map(Value::as_str)
        .map(strip_player_prefix)
        .find(|s| !s.is_empty())
}

/// Whether the body, or one of its error fields, is the offline sentinel
pub fn is_link_fault(body: &Value) -> bool {
    LINK_FAULT_PATHS
        .iter()
        .filter_map(|path| lookup(body, path))
        .any(|v| v.as_str() == Some(LINK_FAULT))
}

/// Whether a raw cmd is already a playable URL
pub fn is_stream_url(cmd: &str) -> bool {
    STREAM_SCHEMES.iter().any(|scheme| cmd.starts_with(scheme))
}

fn strip_player_prefix(cmd: &str) -> &str {
    let cmd = cmd.trim_start();
    PLAYER_PREFIXES
        .iter()
        .find_map(|prefix| {
            if cmd.trim_end() == prefix.trim_end() {
                Some("")
            } else {
                cmd.strip_prefix(prefix)
            }
        })
        .unwrap_or(cmd)
        .trim()
}

/// Resolve a create_link response into a playable URL.
///
/// Order: response `cmd`, then the offline sentinel, then the input `cmd`
/// when it is already a stream URL.
pub fn resolve_link(cmd: &str, body: &Value) -> Result<String, PortalError> {
    if let Some(url) = extract_cmd(body) {
        return Ok(url.to_string());
    }
    if is_link_fault(body) {
        return Err(PortalError::StreamUnavailable);
    }
    if is_stream_url(cmd) {
        return Ok(cmd.to_string());
    }
    Err(PortalError::LinkResolutionFailed { body: body.clone() })
}

/// Channel entries from a get_all_channels body
pub fn extract_channels(body: &Value) -> Result<Vec<RawChannelEntry>, PortalError> {
    let list = CHANNEL_LIST_PATHS
        .iter()
        .filter_map(|path| lookup(body, path))
        .find(|v| v.is_array())
        .ok_or_else(|| PortalError::MalformedResponse {
            reason: "channel list not found at js.data".to_string(),
            body: truncate(&body.to_string()),
        })?;

    serde_json::from_value(list.clone()).map_err(|e| PortalError::MalformedResponse {
        reason: format!("Invalid channel entry: {}", e),
        body: truncate(&list.to_string()),
    })
}

/// Keep diagnostic bodies bounded
pub fn truncate(body: &str) -> String {
    const MAX: usize = 4096;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
