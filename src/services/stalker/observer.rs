//! Handshake probe diagnostics

use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::PortalError;
use super::types::CandidateEndpoint;
use crate::metrics;

/// Something that happened while probing candidate endpoints
#[derive(Debug)]
pub enum ProbeEvent<'a> {
    Started {
        base_candidates: usize,
    },
    Attempt {
        index: usize,
        candidate: &'a CandidateEndpoint,
        retry: bool,
    },
    AttemptFailed {
        index: usize,
        candidate: &'a CandidateEndpoint,
        error: &'a PortalError,
        elapsed: Duration,
    },
    Priming {
        index: usize,
        referer: &'a str,
    },
    PrimingFailed {
        index: usize,
        error: &'a PortalError,
    },
    CookiesHarvested {
        index: usize,
        cookies: &'a [String],
    },
    Succeeded {
        index: usize,
        candidate: &'a CandidateEndpoint,
        elapsed: Duration,
    },
    Blocked {
        index: usize,
        candidate: &'a CandidateEndpoint,
        status: u16,
    },
    Cancelled {
        attempted: usize,
    },
    Exhausted {
        attempted: usize,
    },
}

impl ProbeEvent<'_> {
    /// Short label, also used as the metrics outcome
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeEvent::Started { .. } => "started",
            ProbeEvent::Attempt { retry: false, .. } => "attempt",
            ProbeEvent::Attempt { retry: true, .. } => "retry",
            ProbeEvent::AttemptFailed { .. } => "failed",
            ProbeEvent::Priming { .. } => "priming",
            ProbeEvent::PrimingFailed { .. } => "priming_failed",
            ProbeEvent::CookiesHarvested { .. } => "cookies",
            ProbeEvent::Succeeded { .. } => "success",
            ProbeEvent::Blocked { .. } => "blocked",
            ProbeEvent::Cancelled { .. } => "cancelled",
            ProbeEvent::Exhausted { .. } => "exhausted",
        }
    }
}

/// Receives probe diagnostics. Must not influence control flow.
pub trait ProbeObserver: Send + Sync {
    fn on_event(&self, event: &ProbeEvent<'_>);
}

/// Default observer: structured logs plus Prometheus counters
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProbeObserver for TracingObserver {
    fn on_event(&self, event: &ProbeEvent<'_>) {
        match event {
            ProbeEvent::Started { base_candidates } => {
                debug!(candidates = base_candidates, "Probing Stalker candidates");
            }
            ProbeEvent::Attempt {
                index,
                candidate,
                retry,
            } => {
                debug!(
                    index,
                    url = %candidate.api_url,
                    referer = %candidate.referer,
                    retry,
                    "Trying handshake"
                );
            }
            ProbeEvent::AttemptFailed {
                index,
                candidate,
                error,
                elapsed,
            } => {
                warn!(
                    index,
                    url = %candidate.api_url,
                    elapsed_ms = elapsed.as_millis() as u64,
                    category = error.category(),
                    "Handshake failed: {}",
                    error
                );
            }
            ProbeEvent::Priming { index, referer } => {
                debug!(index, referer, "403 Forbidden, priming session cookies");
            }
            ProbeEvent::PrimingFailed { index, error } => {
                warn!(index, "Session priming failed: {}", error);
            }
            ProbeEvent::CookiesHarvested { index, cookies } => {
                debug!(index, count = cookies.len(), "Got cookies from prime request");
            }
            ProbeEvent::Succeeded {
                index,
                candidate,
                elapsed,
            } => {
                info!(
                    index,
                    url = %candidate.api_url,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Handshake success"
                );
            }
            ProbeEvent::Blocked {
                index,
                candidate,
                status,
            } => {
                warn!(index, url = %candidate.api_url, status, "Provider blocked the handshake");
            }
            ProbeEvent::Cancelled { attempted } => {
                warn!(attempted, "Handshake cancelled by deadline");
            }
            ProbeEvent::Exhausted { attempted } => {
                warn!(attempted, "All candidate URLs failed");
            }
        }

        metrics::HANDSHAKE_EVENTS
            .with_label_values(&[event.kind()])
            .inc();
    }
}
