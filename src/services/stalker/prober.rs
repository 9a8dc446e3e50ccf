//! Stalker Handshake Prober
//!
//! Walks candidate endpoints in priority order until one hands out a token.
//! A 403 triggers a single cookie-priming round: the candidate's landing page
//! is fetched for its `Set-Cookie` values and the handshake is retried once.

use reqwest::header::{SET_COOKIE, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::error::{ExhaustionCause, PortalError};
use super::interpreter::{extract_token, is_blocked, parse_json, truncate};
use super::observer::{ProbeEvent, ProbeObserver, TracingObserver};
use super::session::{build_headers, PortalSession, MAG_USER_AGENT};
use super::types::{CandidateEndpoint, HandshakeResult};

/// Default per-attempt timeout
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);
/// Default timeout for the landing-page priming request
pub const DEFAULT_PRIME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HandshakeProber {
    http: Client,
    attempt_timeout: Duration,
    prime_timeout: Duration,
    observer: Arc<dyn ProbeObserver>,
}

impl HandshakeProber {
    pub fn new(http: Client, attempt_timeout: Duration, prime_timeout: Duration) -> Self {
        Self {
            http,
            attempt_timeout,
            prime_timeout,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProbeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Probe `candidates` in order and return the first successful handshake.
    ///
    /// On success the token is stored in `session`. `cancel` is checked
    /// between candidates, never mid-request.
    pub async fn handshake(
        &self,
        session: &mut PortalSession,
        candidates: &[CandidateEndpoint],
        cancel: &CancellationToken,
    ) -> Result<HandshakeResult, PortalError> {
        self.observer.on_event(&ProbeEvent::Started {
            base_candidates: candidates.len(),
        });

        let mut last_error: Option<PortalError> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                self.observer
                    .on_event(&ProbeEvent::Cancelled { attempted: index });
                return Err(PortalError::HandshakeExhausted {
                    cause: ExhaustionCause::Cancelled,
                    last: last_error.map(Box::new),
                });
            }

            match self.probe_candidate(index, session, candidate).await {
                Ok(result) => {
                    session.set_token(result.token.clone());
                    return Ok(result);
                }
                Err(PortalError::UpstreamBlocked { status }) => {
                    self.observer.on_event(&ProbeEvent::Blocked {
                        index,
                        candidate,
                        status,
                    });
                    return Err(PortalError::UpstreamBlocked { status });
                }
                Err(err) => last_error = Some(err),
            }
        }

        self.observer.on_event(&ProbeEvent::Exhausted {
            attempted: candidates.len(),
        });
        Err(PortalError::HandshakeExhausted {
            cause: ExhaustionCause::AllCandidatesFailed,
            last: last_error.map(Box::new),
        })
    }

    /// One candidate: attempt, and on 403 prime cookies and retry once
    async fn probe_candidate(
        &self,
        index: usize,
        session: &mut PortalSession,
        candidate: &CandidateEndpoint,
    ) -> Result<HandshakeResult, PortalError> {
        let status = match self.attempt(index, session, candidate, false).await {
            Err(PortalError::AuthRejected { status }) => status,
            other => return other,
        };

        self.observer.on_event(&ProbeEvent::Priming {
            index,
            referer: &candidate.referer,
        });
        let cookies = match self.prime(&candidate.referer).await {
            Ok(cookies) => cookies,
            Err(err) => {
                self.observer
                    .on_event(&ProbeEvent::PrimingFailed { index, error: &err });
                return Err(PortalError::AuthRejected { status });
            }
        };
        if cookies.is_empty() {
            return Err(PortalError::AuthRejected { status });
        }

        self.observer.on_event(&ProbeEvent::CookiesHarvested {
            index,
            cookies: &cookies,
        });
        session.merge_cookies(cookies);

        self.attempt(index, session, candidate, true).await
    }

    async fn attempt(
        &self,
        index: usize,
        session: &PortalSession,
        candidate: &CandidateEndpoint,
        retry: bool,
    ) -> Result<HandshakeResult, PortalError> {
        self.observer.on_event(&ProbeEvent::Attempt {
            index,
            candidate,
            retry,
        });

        let started = Instant::now();
        let result = self.send_handshake(session, candidate).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => self.observer.on_event(&ProbeEvent::Succeeded {
                index,
                candidate,
                elapsed,
            }),
            Err(error) => self.observer.on_event(&ProbeEvent::AttemptFailed {
                index,
                candidate,
                error,
                elapsed,
            }),
        }

        result
    }

    async fn send_handshake(
        &self,
        session: &PortalSession,
        candidate: &CandidateEndpoint,
    ) -> Result<HandshakeResult, PortalError> {
        let mac = session.mac();
        let headers = build_headers(mac, None, &candidate.referer, session.cookies())?;

        let response = self
            .http
            .get(&candidate.api_url)
            .headers(headers)
            .query(&[
                ("type", "stb"),
                ("action", "handshake"),
                ("token", ""),
                ("mac", mac),
                ("deviceId", mac),
                ("deviceId2", mac),
                ("signature", ""),
            ])
            .timeout(self.attempt_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if is_blocked(status.as_u16(), &body) {
            return Err(PortalError::UpstreamBlocked {
                status: status.as_u16(),
            });
        }
        if status.as_u16() == 403 {
            return Err(PortalError::AuthRejected { status: 403 });
        }
        if !status.is_success() {
            return Err(PortalError::Upstream {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        let json = parse_json(&body)?;
        let token = extract_token(&json)
            .ok_or_else(|| PortalError::MalformedResponse {
                reason: "handshake response carries no token".to_string(),
                body: truncate(&body),
            })?
            .to_string();

        Ok(HandshakeResult {
            token,
            real_url: candidate.api_url.clone(),
            body: json,
        })
    }

    /// Fetch the landing page and keep the `name=value` part of each cookie
    async fn prime(&self, referer: &str) -> Result<Vec<String>, PortalError> {
        let response = self
            .http
            .get(referer)
            .header(USER_AGENT, MAG_USER_AGENT)
            .timeout(self.prime_timeout)
            .send()
            .await?;

        Ok(response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('='))
            .map(str::to_string)
            .collect())
    }
}
