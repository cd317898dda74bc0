//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building the HTTP client with the configured user agent and TLS policy
//! - Owning that client as a lazily created, explicitly closed session pool
//! - GET requests with bounded retry on rate limiting and transient failures
//! - Classifying every outcome into a [`FetchResult`]

use crate::config::FetchConfig;
use crate::ScrapeError;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Why a fetch did not produce a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request or the body read timed out
    Timeout,
    /// HTTP 429
    RateLimited,
    /// Connection, DNS, TLS or other transport failure
    Transport,
    /// Body shorter than the minimum content threshold
    EmptyBody,
    /// Any other non-success HTTP status
    HttpStatus(u16),
    /// The session pool was closed before the request was issued
    PoolClosed,
}

impl FailureKind {
    /// Returns true if the failure is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Transport)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::RateLimited => f.write_str("rate_limited"),
            Self::Transport => f.write_str("transport_error"),
            Self::EmptyBody => f.write_str("empty_body"),
            Self::HttpStatus(code) => write!(f, "http_{}", code),
            Self::PoolClosed => f.write_str("pool_closed"),
        }
    }
}

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// Successfully fetched the page
    Fetched {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Gave up on the URL
    Failed {
        kind: FailureKind,
        /// Requests issued, including the first
        attempts: u32,
        /// Error description
        detail: String,
    },
}

impl FetchResult {
    /// Returns the failure kind, if the fetch failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Fetched { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Backoff schedule and attempt ceiling
///
/// | Condition | Delay before retry `k` (0-based) |
/// |-----------|----------------------------------|
/// | HTTP 429 | `rate_limit_base * 2^k` |
/// | Timeout / transport error | `transient` |
/// | Anything else | not retried |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub ceiling: u32,
    pub rate_limit_base: Duration,
    pub transient: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            ceiling: config.retry_ceiling,
            rate_limit_base: Duration::from_millis(config.rate_limit_backoff_ms),
            transient: Duration::from_millis(config.transient_backoff_ms),
        }
    }

    /// Delay to wait after failed attempt `attempt` before the next one
    pub fn delay_for(&self, kind: FailureKind, attempt: u32) -> Duration {
        match kind {
            FailureKind::RateLimited => self
                .rate_limit_base
                .saturating_mul(2u32.saturating_pow(attempt)),
            _ => self.transient,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    if config.accept_invalid_certs {
        tracing::warn!("TLS certificate verification is disabled (accept-invalid-certs = true)");
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_millis(config.timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

enum PoolState {
    Idle,
    Open(Client),
    Closed,
}

/// Owned handle to the HTTP connection pool
///
/// The client is built on first use and shared by every request afterwards;
/// the pool itself is safe for concurrent use. [`SessionPool::close`] tears it
/// down once; later requests fail with [`FailureKind::PoolClosed`].
pub struct SessionPool {
    config: FetchConfig,
    state: Mutex<PoolState>,
}

impl SessionPool {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState::Idle),
        }
    }

    /// Returns the shared client, creating it on first use
    pub fn client(&self) -> crate::Result<Client> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            PoolState::Open(client) => Ok(client.clone()),
            PoolState::Closed => Err(ScrapeError::PoolClosed),
            PoolState::Idle => {
                let client = build_http_client(&self.config)?;
                tracing::debug!("HTTP session pool opened");
                *state = PoolState::Open(client.clone());
                Ok(client)
            }
        }
    }

    /// Returns true while requests can still be issued
    pub fn is_open(&self) -> bool {
        !matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            PoolState::Closed
        )
    }

    /// Closes the pool
    ///
    /// Returns true for the call that actually closed it.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, PoolState::Closed) {
            PoolState::Closed => false,
            PoolState::Open(_) => {
                tracing::debug!("HTTP session pool closed");
                true
            }
            PoolState::Idle => true,
        }
    }
}

/// Fetches pages through a shared session pool
///
/// Holds no per-request state; clones share the same pool.
#[derive(Clone)]
pub struct PageFetcher {
    pool: Arc<SessionPool>,
    retry: RetryPolicy,
    min_body_bytes: usize,
}

impl PageFetcher {
    pub fn new(pool: Arc<SessionPool>, retry: RetryPolicy, min_body_bytes: usize) -> Self {
        Self {
            pool,
            retry,
            min_body_bytes,
        }
    }

    /// Creates a fetcher with its own pool from the fetch configuration
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            Arc::new(SessionPool::new(config.clone())),
            RetryPolicy::from_config(config),
            config.min_body_bytes,
        )
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Fetches a URL, retrying rate limiting and transient failures
    ///
    /// Never returns an error: exhausting the retry ceiling yields
    /// [`FetchResult::Failed`] with the kind of the last failure.
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let mut attempt: u32 = 0;

        loop {
            let (kind, detail) = match self.fetch_once(url).await {
                Ok(fetched) => return fetched,
                Err(failure) => failure,
            };

            if !kind.is_retryable() {
                tracing::debug!("Fetch of {} failed ({}): {}", url, kind, detail);
                return FetchResult::Failed {
                    kind,
                    attempts: attempt + 1,
                    detail,
                };
            }

            if attempt >= self.retry.ceiling {
                tracing::warn!(
                    "Giving up on {} after {} attempts ({}): {}",
                    url,
                    attempt + 1,
                    kind,
                    detail
                );
                return FetchResult::Failed {
                    kind,
                    attempts: attempt + 1,
                    detail,
                };
            }

            let delay = self.retry.delay_for(kind, attempt);
            tracing::debug!(
                "{} on {}, retry {}/{} in {:?}",
                kind,
                url,
                attempt + 1,
                self.retry.ceiling,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Issues a single GET and classifies the response
    async fn fetch_once(&self, url: &str) -> Result<FetchResult, (FailureKind, String)> {
        let client = self
            .pool
            .client()
            .map_err(|e| (FailureKind::PoolClosed, e.to_string()))?;

        let response = client.get(url).send().await.map_err(classify_error)?;
        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err((FailureKind::RateLimited, "HTTP 429".to_string()));
        }

        let bytes = response.bytes().await.map_err(classify_error)?;

        if bytes.len() < self.min_body_bytes {
            return Err((
                FailureKind::EmptyBody,
                format!(
                    "{} bytes (< {}) with HTTP {}",
                    bytes.len(),
                    self.min_body_bytes,
                    status.as_u16()
                ),
            ));
        }

        if !status.is_success() {
            return Err((
                FailureKind::HttpStatus(status.as_u16()),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        Ok(FetchResult::Fetched {
            final_url,
            status_code: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn classify_error(e: reqwest::Error) -> (FailureKind, String) {
    if e.is_timeout() {
        (FailureKind::Timeout, "Request timeout".to_string())
    } else {
        (FailureKind::Transport, e.to_string())
    }
}
