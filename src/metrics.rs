//! Prometheus counters exposed on /metrics

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Handshake probe events (attempt, retry, success, blocked, ...)
    pub static ref HANDSHAKE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "stalker_handshake_events_total",
        "Handshake probe events by kind",
        &["kind"]
    )
    .unwrap();

    /// Control endpoint calls by action and outcome category
    pub static ref PORTAL_CALLS: IntCounterVec = register_int_counter_vec!(
        "stalker_portal_calls_total",
        "Portal control calls by action and outcome",
        &["action", "outcome"]
    )
    .unwrap();

    /// Byte proxy and playlist fetches by outcome
    pub static ref PROXY_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "proxy_requests_total",
        "Proxied upstream fetches by route and outcome",
        &["route", "outcome"]
    )
    .unwrap();
}
