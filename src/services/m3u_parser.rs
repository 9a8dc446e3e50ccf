//! M3U playlist fetching and parsing
//!
//! Plain M3U playlists are the fallback login path next to portals. Providers
//! that dislike the client often answer with HTML or an "Access Denied" page
//! instead of a playlist, so content is checked before parsing.

use futures::StreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{ACCEPT, REFERER, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Channel, Playlist};
use crate::services::stalker::interpreter::BLOCKED_STATUS;

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap();
}

/// Substrings that mark a provider error page served in place of a playlist
const BLOCK_SIGNATURES: &[&str] = &["403 Forbidden", "Access Denied", "Error 884"];

#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("Failed to fetch resource: {message}")]
    Network { message: String, timeout: bool },

    #[error("Upstream returned HTTP {status}")]
    Upstream { status: u16 },

    #[error("Provider blocked the request ({reason}).")]
    Blocked {
        status: Option<u16>,
        reason: String,
    },

    #[error("Playlist exceeds {max_mb} MB")]
    TooLarge { max_mb: usize },

    #[error("Received invalid response format (not a string).")]
    NotText,

    #[error("Playlist is empty or invalid.")]
    Empty,
}

impl PlaylistError {
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            PlaylistError::Upstream { status } => Some(*status),
            PlaylistError::Blocked { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PlaylistError {
    fn from(err: reqwest::Error) -> Self {
        PlaylistError::Network {
            message: err.to_string(),
            timeout: err.is_timeout(),
        }
    }
}

/// Fetch playlist text, bounded by `max_bytes`
pub async fn fetch_playlist(
    http: &Client,
    url: &str,
    user_agent: &str,
    referer: Option<&str>,
    timeout: Duration,
    max_bytes: usize,
) -> Result<String, PlaylistError> {
    let mut request = http
        .get(url)
        .header(USER_AGENT, user_agent)
        .header(ACCEPT, "*/*")
        .timeout(timeout);
    if let Some(referer) = referer {
        request = request.header(REFERER, referer);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    if status == BLOCKED_STATUS {
        return Err(PlaylistError::Blocked {
            status: Some(status),
            reason: format!("Status {}", status),
        });
    }
    if !response.status().is_success() {
        return Err(PlaylistError::Upstream { status });
    }

    let mut buffer = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buffer.len() + chunk.len() > max_bytes {
            return Err(PlaylistError::TooLarge {
                max_mb: max_bytes / (1024 * 1024),
            });
        }
        buffer.extend_from_slice(&chunk);
    }

    String::from_utf8(buffer).map_err(|_| PlaylistError::NotText)
}

/// Reject provider error pages served in place of a playlist
pub fn check_content(content: &str) -> Result<(), PlaylistError> {
    if BLOCK_SIGNATURES.iter().any(|sig| content.contains(sig)) {
        return Err(PlaylistError::Blocked {
            status: None,
            reason: "Access Denied/Forbidden".to_string(),
        });
    }

    // Headerless lists are still parsed; HTML never is
    if !content.trim_start().starts_with("#EXTM3U")
        && (content.contains("<!DOCTYPE html>") || content.contains("<html"))
    {
        return Err(PlaylistError::Blocked {
            status: None,
            reason: "Received HTML instead of M3U playlist".to_string(),
        });
    }

    Ok(())
}

/// Parsed EXTINF line data
#[derive(Debug, Default)]
struct ExtinfData {
    attributes: Vec<(String, String)>,
    title: String,
}

impl ExtinfData {
    fn attr(&self, key: &str) -> String {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

/// Index of the first comma outside double quotes
fn title_separator(content: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, c) in content.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix("#EXTINF:")?;
    let separator = title_separator(content)?;

    let header = &content[..separator];
    let title = content[separator + 1..].trim().to_string();

    let attributes = ATTR_REGEX
        .captures_iter(header)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();

    Some(ExtinfData { attributes, title })
}

/// Parse M3U text into channel records
pub fn parse_m3u(content: &str) -> Result<Playlist, PlaylistError> {
    let mut playlist = Playlist::default();
    let mut current: Option<Channel> = None;

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("#EXTM3U") {
            playlist.header = Some(line.to_string());
            continue;
        }

        if line.starts_with("#EXTINF:") {
            let mut channel = Channel {
                raw: line.to_string(),
                ..Default::default()
            };
            if let Some(extinf) = parse_extinf(line) {
                channel.tvg.id = extinf.attr("tvg-id");
                channel.tvg.name = extinf.attr("tvg-name");
                channel.tvg.logo = extinf.attr("tvg-logo");
                channel.tvg.url = extinf.attr("tvg-url");
                channel.tvg.rec = extinf.attr("tvg-rec");
                channel.group.title = extinf.attr("group-title");
                channel.http.user_agent = extinf.attr("user-agent");
                channel.http.referrer = extinf.attr("referrer");
                channel.name = extinf.title;
            }
            current = Some(channel);
            continue;
        }

        if line.starts_with('#') {
            if let Some(channel) = current.as_mut() {
                channel.raw.push('\n');
                channel.raw.push_str(line);
                if let Some(group) = line.strip_prefix("#EXTGRP:") {
                    if channel.group.title.is_empty() {
                        channel.group.title = group.trim().to_string();
                    }
                } else if let Some(referrer) = line.strip_prefix("#EXTVLCOPT:http-referrer=") {
                    channel.http.referrer = referrer.trim().to_string();
                } else if let Some(agent) = line.strip_prefix("#EXTVLCOPT:http-user-agent=") {
                    channel.http.user_agent = agent.trim().to_string();
                }
            }
            continue;
        }

        // URL line closes the current entry
        let mut channel = current.take().unwrap_or_default();
        if channel.raw.is_empty() {
            channel.raw = line.to_string();
        } else {
            channel.raw.push('\n');
            channel.raw.push_str(line);
        }
        channel.url = line.to_string();
        playlist.items.push(channel);
    }

    if playlist.items.is_empty() {
        return Err(PlaylistError::Empty);
    }
    Ok(playlist)
}
