use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub node_env: String,

    // Portal
    pub portal_timeout_ms: u64,
    pub portal_prime_timeout_ms: u64,
    pub handshake_deadline_ms: Option<u64>,

    // Proxy
    pub proxy_timeout_ms: u64,
    pub max_playlist_size_mb: usize,

    // Misc
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),
            node_env: env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string()),

            // Portal
            portal_timeout_ms: env::var("PORTAL_TIMEOUT_MS")
                .unwrap_or_else(|_| "15000".to_string())
                .parse()
                .unwrap_or(15_000), // 15 seconds per candidate

            portal_prime_timeout_ms: env::var("PORTAL_PRIME_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5_000),

            handshake_deadline_ms: env::var("HANDSHAKE_DEADLINE_MS")
                .ok()
                .and_then(|v| v.parse().ok()),

            // Proxy
            proxy_timeout_ms: env::var("PROXY_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000),

            max_playlist_size_mb: env::var("PLAYLIST_MAX_MB")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),

            // Misc - desktop browser UA; some providers dislike IPTV players
            user_agent: env::var("USER_AGENT").unwrap_or_else(|_| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
            }),
        }
    }

    /// Playlist download cap in bytes
    pub fn max_playlist_bytes(&self) -> usize {
        self.max_playlist_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
