//! Stalker Portal Endpoint Discovery
//!
//! Portals are deployed under many historical layouts (`/c/`, `/portal/`,
//! `/stalker_portal/`, `/mag/`, `/ministra/`, nested sub-paths...). Given the
//! URL a user typed, this module produces the ordered list of control-script
//! URLs worth probing, each paired with the referer the portal expects.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use super::types::CandidateEndpoint;

/// Control script every Stalker layout ends in
pub const CONTROL_SCRIPT: &str = "load.php";
const SERVER_CONTROL_PATH: &str = "/server/load.php";

/// (api suffix, referer suffix) tried against the working root
const SUFFIX_PATTERNS: &[(&str, &str)] = &[
    ("/server/load.php", "/"),
    ("/c/server/load.php", "/c/"),
    ("/portal/server/load.php", "/portal/"),
    ("/stalker_portal/server/load.php", "/stalker_portal/c/"),
    ("/stalker_portal/server/load.php", "/stalker_portal/"),
    ("/mag/server/load.php", "/mag/"),
    ("/ministra/server/load.php", "/ministra/"),
];

/// Smaller set tried against every parent path of the working root
const WALK_UP_PATTERNS: &[(&str, &str)] = &[
    ("/server/load.php", "/"),
    ("/c/server/load.php", "/c/"),
    ("/portal/server/load.php", "/portal/"),
    ("/stalker_portal/server/load.php", "/stalker_portal/c/"),
];

/// Tried against `scheme://host[:port]`
const ROOT_PATTERNS: &[(&str, &str)] = &[
    ("/server/load.php", "/"),
    ("/c/server/load.php", "/c/"),
    ("/portal/server/load.php", "/portal/"),
    ("/stalker_portal/server/load.php", "/stalker_portal/c/"),
    ("/mag/server/load.php", "/mag/"),
];

lazy_static! {
    /// Runs of slashes that don't directly follow a scheme separator
    static ref DUPLICATE_SLASHES: Regex = Regex::new(r"([^:]/)/+").unwrap();
}

/// Collapse `//` runs except the one after `scheme:`
pub fn collapse_slashes(url: &str) -> String {
    DUPLICATE_SLASHES.replace_all(url, "$1").into_owned()
}

/// Ordered, de-duplicated candidate list. First seen wins.
#[derive(Debug, Default)]
struct CandidateList {
    items: Vec<CandidateEndpoint>,
}

impl CandidateList {
    fn push(&mut self, api_url: &str, referer: &str) {
        let api_url = collapse_slashes(api_url);
        let referer = collapse_slashes(referer);

        let key = api_url.trim_end_matches('/');
        if self
            .items
            .iter()
            .any(|c| c.api_url.trim_end_matches('/') == key)
        {
            return;
        }
        self.items.push(CandidateEndpoint::new(api_url, referer));
    }

    fn push_patterns(&mut self, base: &str, patterns: &[(&str, &str)]) {
        for (api_suffix, referer_suffix) in patterns {
            self.push(
                &format!("{}{}", base, api_suffix),
                &format!("{}{}", base, referer_suffix),
            );
        }
    }
}

/// `scheme://host[:port]` of a parsed URL
fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port_suffix = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    Some(format!("{}://{}{}", url.scheme(), host, port_suffix))
}

/// Generate the ordered list of endpoints to probe for `base_url`.
///
/// Pure and deterministic: the same input always yields the same list.
/// Inputs that are not valid URLs simply contribute fewer candidates.
pub fn generate_candidates(base_url: &str) -> Vec<CandidateEndpoint> {
    let mut base = base_url.trim().to_string();
    if base.ends_with('/') {
        base.pop();
    }

    let mut list = CandidateList::default();

    // Explicit control script: try it verbatim before guessing
    if base.contains(CONTROL_SCRIPT) {
        let parent = match base.rfind('/') {
            Some(idx) => &base[..=idx],
            None => base.as_str(),
        };
        list.push(&base, parent);

        base = match base.find(SERVER_CONTROL_PATH) {
            Some(idx) => base[..idx].to_string(),
            None => match base.rfind('/') {
                Some(idx) => base[..idx].to_string(),
                None => base,
            },
        };
    }

    list.push_patterns(&base, SUFFIX_PATTERNS);

    // Walk up the path to recover endpoints nested deeper than one directory
    if let Ok(parsed) = Url::parse(&base) {
        if let Some(origin) = origin_of(&parsed) {
            let mut segments: Vec<&str> = parsed
                .path_segments()
                .map(|s| s.filter(|seg| !seg.is_empty()).collect())
                .unwrap_or_default();

            while segments.pop().is_some() {
                let current = if segments.is_empty() {
                    origin.clone()
                } else {
                    format!("{}/{}", origin, segments.join("/"))
                };
                list.push_patterns(&current, WALK_UP_PATTERNS);
            }
        }
    }

    // Bare host root
    let with_scheme = if base.starts_with("http") {
        base.clone()
    } else {
        format!("http://{}", base)
    };
    if let Some(root) = Url::parse(&with_scheme).ok().as_ref().and_then(origin_of) {
        if root != with_scheme {
            list.push_patterns(&root, ROOT_PATTERNS);
        }
    }

    list.items
}

/// URL to use for authenticated calls.
///
/// Clients should send back the `real_url` from the handshake; anything
/// without a control script gets the default one appended.
pub fn api_url_for_calls(url: &str) -> String {
    let url = url.trim();
    if url.contains(CONTROL_SCRIPT) {
        return url.to_string();
    }
    format!("{}{}", url.trim_end_matches('/'), SERVER_CONTROL_PATH)
}

/// Referer for authenticated calls made against `api_url`
pub fn default_referer(api_url: &str) -> String {
    match api_url.find(SERVER_CONTROL_PATH) {
        Some(idx) => format!("{}/", &api_url[..idx]),
        None => api_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn api_urls(candidates: &[CandidateEndpoint]) -> Vec<&str> {
        candidates.iter().map(|c| c.api_url.as_str()).collect()
    }

    fn position(candidates: &[CandidateEndpoint], api_url: &str) -> usize {
        candidates
            .iter()
            .position(|c| c.api_url == api_url)
            .unwrap_or_else(|| panic!("missing candidate {}", api_url))
    }

    #[test]
    fn test_generate_is_deterministic() {
        let url = "http://portal.example.com:8080/stalker_portal/c/";
        assert_eq!(generate_candidates(url), generate_candidates(url));
    }

    #[test]
    fn test_generate_has_no_duplicates() {
        for url in [
            "http://example.com",
            "http://example.com/c/",
            "http://example.com/a/b/c",
            "http://example.com:8080/stalker_portal/server/load.php",
        ] {
            let candidates = generate_candidates(url);
            let unique: HashSet<_> = candidates
                .iter()
                .map(|c| c.api_url.trim_end_matches('/'))
                .collect();
            assert_eq!(unique.len(), candidates.len(), "duplicates for {}", url);
        }
    }

    #[test]
    fn test_explicit_control_script_first() {
        let url = "http://portal.tv:8080/stalker_portal/server/load.php";
        let candidates = generate_candidates(url);

        assert_eq!(
            candidates[0],
            CandidateEndpoint::new(url, "http://portal.tv:8080/stalker_portal/server/")
        );
        // Same URL is not probed twice
        assert_eq!(api_urls(&candidates).iter().filter(|u| **u == url).count(), 1);
        assert!(candidates
            .iter()
            .any(|c| c.api_url == "http://portal.tv:8080/server/load.php"));
    }

    #[test]
    fn test_c_path_before_root_guesses() {
        let candidates = generate_candidates("http://example.com/c/");

        assert_eq!(
            candidates[0],
            CandidateEndpoint::new("http://example.com/c/server/load.php", "http://example.com/c/")
        );
        let nested = position(&candidates, "http://example.com/c/server/load.php");
        let root = position(&candidates, "http://example.com/server/load.php");
        assert!(nested < root);
    }

    #[test]
    fn test_suffix_patterns_order() {
        let candidates = generate_candidates("http://example.com/");

        assert_eq!(
            &api_urls(&candidates)[..6],
            &[
                "http://example.com/server/load.php",
                "http://example.com/c/server/load.php",
                "http://example.com/portal/server/load.php",
                "http://example.com/stalker_portal/server/load.php",
                "http://example.com/mag/server/load.php",
                "http://example.com/ministra/server/load.php",
            ]
        );
        assert_eq!(candidates[3].referer, "http://example.com/stalker_portal/c/");
    }

    #[test]
    fn test_walk_up_nested_paths() {
        let candidates = generate_candidates("http://example.com/a/b");

        let deep = position(&candidates, "http://example.com/a/b/server/load.php");
        let parent = position(&candidates, "http://example.com/a/server/load.php");
        let root = position(&candidates, "http://example.com/server/load.php");
        assert!(deep < parent && parent < root);
        assert_eq!(candidates[parent].referer, "http://example.com/a/");
    }

    #[test]
    fn test_root_patterns_keep_port() {
        let candidates = generate_candidates("https://tv.example.org:25461/panel/c");

        assert!(candidates
            .iter()
            .any(|c| c.api_url == "https://tv.example.org:25461/mag/server/load.php"
                && c.referer == "https://tv.example.org:25461/mag/"));
    }

    #[test]
    fn test_collapses_duplicate_slashes() {
        let candidates = generate_candidates("http://example.com//portal//");

        for c in &candidates {
            assert!(!c.api_url["http://".len()..].contains("//"), "{}", c.api_url);
            assert!(!c.referer["http://".len()..].contains("//"), "{}", c.referer);
        }
        assert_eq!(collapse_slashes("https://a.b//c///d"), "https://a.b/c/d");
    }

    #[test]
    fn test_malformed_input_is_not_fatal() {
        let candidates = generate_candidates("not a url at all");
        // Only the blind suffix guesses survive
        assert_eq!(candidates[0].api_url, "not a url at all/server/load.php");

        let candidates = generate_candidates("portal.example.com/c");
        assert!(candidates
            .iter()
            .any(|c| c.api_url == "http://portal.example.com/server/load.php"));
    }

    #[test]
    fn test_api_url_for_calls() {
        assert_eq!(
            api_url_for_calls("http://example.com/c/server/load.php"),
            "http://example.com/c/server/load.php"
        );
        assert_eq!(
            api_url_for_calls("http://example.com/c/"),
            "http://example.com/c/server/load.php"
        );
    }

    #[test]
    fn test_default_referer() {
        assert_eq!(
            default_referer("http://example.com/stalker_portal/server/load.php"),
            "http://example.com/stalker_portal/"
        );
        assert_eq!(
            default_referer("http://example.com/portal.php"),
            "http://example.com/portal.php"
        );
    }
}
