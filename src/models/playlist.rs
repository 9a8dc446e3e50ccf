use serde::{Deserialize, Serialize};

/// tvg-* attributes of an EXTINF entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TvgInfo {
    pub id: String,
    pub name: String,
    pub logo: String,
    pub url: String,
    pub rec: String,
}

/// Group an entry belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub title: String,
}

/// Per-entry HTTP overrides from #EXTVLCOPT lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpOptions {
    pub referrer: String,
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

/// Single playlist channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub tvg: TvgInfo,
    pub group: GroupInfo,
    pub http: HttpOptions,
    pub url: String,
    pub raw: String,
}

/// Parsed M3U playlist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub items: Vec<Channel>,
}
