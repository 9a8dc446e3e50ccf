//! Portal session state and MAG device header emulation

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, REFERER, USER_AGENT,
};

use super::error::PortalError;

/// Firmware User-Agent of a MAG200/250 running stbapp
pub const MAG_USER_AGENT: &str = "Mozilla/5.0 (QtEmbedded; U; Linux; C) AppleWebKit/533.3 (KHTML, like Gecko) MAG200 stbapp ver: 2 rev: 250 Safari/533.3";
pub const MAG_X_USER_AGENT: &str = "Model: MAG250; Link: WiFi";
const STB_LANG: &str = "en";
const STB_TIMEZONE: &str = "Europe/London";

/// Device identity plus whatever the portal handed out so far.
///
/// One session belongs to one login attempt. Cookies only ever grow.
#[derive(Debug, Clone)]
pub struct PortalSession {
    mac: String,
    cookies: Vec<String>,
    token: Option<String>,
}

impl PortalSession {
    pub fn new(mac: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            cookies: Vec::new(),
            token: None,
        }
    }

    /// Session for authenticated calls with a token from an earlier handshake
    pub fn with_token(mac: impl Into<String>, token: impl Into<String>) -> Self {
        let mut session = Self::new(mac);
        session.set_token(token);
        session
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    /// Token, if a non-empty one has been issued
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub(crate) fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    /// Merge harvested `name=value` pairs, keeping first-seen order.
    /// Returns how many were new.
    pub fn merge_cookies<I, S>(&mut self, cookies: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for cookie in cookies {
            let cookie: String = cookie.into();
            let cookie = cookie.trim();
            if cookie.is_empty() || self.cookies.iter().any(|c| c == cookie) {
                continue;
            }
            self.cookies.push(cookie.to_string());
            added += 1;
        }
        added
    }

    /// Headers for a request carrying this session's identity
    pub fn headers(&self, referer: &str) -> Result<HeaderMap, PortalError> {
        build_headers(&self.mac, self.token(), referer, &self.cookies)
    }
}

/// Build the MAG device header set.
///
/// Pure: the same `(mac, token, referer, cookies)` always gives the same map.
pub fn build_headers(
    mac: &str,
    token: Option<&str>,
    referer: &str,
    extra_cookies: &[String],
) -> Result<HeaderMap, PortalError> {
    let mut cookie = format!(
        "mac={}; stb_lang={}; timezone={}",
        urlencoding::encode(mac),
        STB_LANG,
        STB_TIMEZONE
    );
    if let Some(token) = token {
        cookie.push_str(&format!("; stoke={}", token));
    }
    for extra in extra_cookies {
        cookie.push_str("; ");
        cookie.push_str(extra);
    }

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(MAG_USER_AGENT));
    headers.insert(REFERER, header_value("Referer", referer)?);
    headers.insert(COOKIE, header_value("Cookie", &cookie)?);
    headers.insert(
        HeaderName::from_static("x-user-agent"),
        HeaderValue::from_static(MAG_X_USER_AGENT),
    );
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers.insert(
        HeaderName::from_static("jshttprequest"),
        HeaderValue::from_static("1-xml"),
    );
    if let Some(token) = token {
        headers.insert(
            AUTHORIZATION,
            header_value("Authorization", &format!("Bearer {}", token))?,
        );
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, PortalError> {
    HeaderValue::from_str(value)
        .map_err(|_| PortalError::InvalidRequest(format!("{} contains invalid characters", name)))
}
