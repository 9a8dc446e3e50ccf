//! Stalker / Ministra Portal Integration
//!
//! Client for MAG-style IPTV middleware portals.
//!
//! # Overview
//!
//! A portal login needs nothing but a base URL and a device MAC address:
//!
//! - **Discovery**: guess the control-script URL among historical layouts
//! - **Handshake**: emulate a MAG250 set-top box to obtain a session token
//! - **API Client**: fetch the profile and channel catalog, and resolve
//!   channel commands into playable stream URLs
//!
//! # URL Layouts
//!
//! The control script normally lives at one of:
//! ```text
//! http://server:port/c/server/load.php            (referer http://server:port/c/)
//! http://server:port/stalker_portal/server/load.php
//! http://server:port/portal/server/load.php
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::services::stalker::{generate_candidates, HandshakeProber, PortalClient, PortalSession};
//!
//! let candidates = generate_candidates("http://portal.example.com/c/");
//! let mut session = PortalSession::new("00:1A:79:00:00:01");
//! let result = prober.handshake(&mut session, &candidates, &cancel).await?;
//! let catalog = client.get_channels(&session, &result.real_url).await?;
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod interpreter;
pub mod observer;
pub mod prober;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use client::{build_http_client, PortalClient};
pub use endpoints::{api_url_for_calls, generate_candidates};
pub use error::{ExhaustionCause, PortalError};
pub use prober::HandshakeProber;
pub use session::PortalSession;
