//! Stalker Portal Types
//!
//! Value types shared by the resolver, prober and client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A guessed control-script URL plus the referer it must be called with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEndpoint {
    /// Full URL of the portal control script (usually `.../server/load.php`)
    pub api_url: String,
    /// Referer header expected by the portal for this layout
    pub referer: String,
}

impl CandidateEndpoint {
    pub fn new(api_url: impl Into<String>, referer: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            referer: referer.into(),
        }
    }
}

/// Outcome of a successful handshake
#[derive(Debug, Clone)]
pub struct HandshakeResult {
    /// Session token issued by the portal
    pub token: String,
    /// The candidate endpoint that answered; every later call must target it
    pub real_url: String,
    /// Raw handshake body as returned upstream
    pub body: Value,
}

/// Channel record as the portal returns it from `get_all_channels`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChannelEntry {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub cmd: String,
    /// Everything else the portal sends (number, tv_genre_id, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Channel catalog: raw upstream body plus the entries found inside it
#[derive(Debug, Clone)]
pub struct ChannelCatalog {
    pub body: Value,
    pub channels: Vec<RawChannelEntry>,
}

/// A channel command exchanged for a playable URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLink {
    pub cmd: String,
    pub resolved_url: String,
}

/// Portals encode ids as either strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_entry_numeric_id() {
        let entry: RawChannelEntry = serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": "News",
            "logo": "http://logo/news.png",
            "cmd": "ffrt http://localhost/ch/42",
            "number": "7"
        }))
        .unwrap();

        assert_eq!(entry.id, "42");
        assert_eq!(entry.name, "News");
        assert_eq!(entry.cmd, "ffrt http://localhost/ch/42");
        assert_eq!(entry.extra.get("number"), Some(&Value::from("7")));
    }

    #[test]
    fn test_channel_entry_missing_fields() {
        let entry: RawChannelEntry =
            serde_json::from_value(serde_json::json!({ "id": "abc" })).unwrap();

        assert_eq!(entry.id, "abc");
        assert!(entry.name.is_empty());
        assert!(entry.logo.is_none());
        assert!(entry.cmd.is_empty());
    }
}
