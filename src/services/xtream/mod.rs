//! Xtream Codes Integration
//!
//! Login against Xtream Codes panels (Player API v2).
//!
//! # URL Layout
//!
//! Credentials are checked at:
//! ```text
//! http://server:port/player_api.php?username=X&password=Y
//! ```
//!
//! and the channel list is the M3U served by:
//! ```text
//! http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts
//! ```

pub mod client;
pub mod types;

pub use client::{XtreamClient, XtreamError};
pub use types::{XtreamCredentials, XtreamServerInfo, XtreamUserInfo};
