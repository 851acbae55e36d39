//! HTTP fetching with bounded exponential backoff.
//!
//! Only transport failures, `5xx` and `429` responses are retried. Every other
//! status fails on the first attempt, and oversized bodies are refused without
//! retrying.

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_FETCH_ATTEMPTS, FETCH_TIMEOUT, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS,
};
use crate::core::AgsyncError;

/// Retry and timeout settings for network fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_FETCH_ATTEMPTS,
            initial_delay_ms: STARTING_BACKOFF_DELAY_MS,
            max_delay_ms: MAX_BACKOFF_DELAY_MS,
            timeout_secs: FETCH_TIMEOUT.as_secs(),
        }
    }
}

impl RetryPolicy {
    /// Delays between attempts: `initial, 2*initial, 4*initial, ...` capped at `max_delay`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        // from_millis(2) doubles each step; factor scales the first step to initial_delay
        ExponentialBackoff::from_millis(2)
            .factor((self.initial_delay_ms / 2).max(1))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .take(self.max_attempts.saturating_sub(1))
    }
}

#[derive(Debug)]
enum FetchError {
    Transport(reqwest::Error),
    Status(StatusCode),
    TooLarge(u64),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::TooLarge(_) => false,
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "{e}"),
            FetchError::Status(status) => write!(f, "HTTP {status}"),
            FetchError::TooLarge(limit) => {
                write!(f, "response exceeds the {} MiB limit", limit / (1024 * 1024))
            }
        }
    }
}

/// HTTP client shared by archive downloads and registry lookups.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(policy.timeout_secs))
            .user_agent(concat!("agsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            policy,
        })
    }

    /// Download `url`, refusing bodies larger than `limit` bytes.
    pub async fn fetch_bytes(&self, url: &str, limit: u64, operation: &str) -> Result<Vec<u8>> {
        let attempt = std::sync::atomic::AtomicUsize::new(0);
        let result = RetryIf::spawn(
            self.policy.delays(),
            || {
                let n = attempt.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
                debug!("{operation}: GET {url} (attempt {n}/{})", self.policy.max_attempts);
                self.get_once(url, limit)
            },
            |e: &FetchError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("{operation} failed for {url}: {e}; retrying");
                }
                retry
            },
        )
        .await;

        result.map_err(|e| {
            AgsyncError::Network {
                operation: operation.to_string(),
                reason: format!("{url}: {e}"),
            }
            .into()
        })
    }

    /// Fetch and parse a JSON document.
    pub async fn fetch_json(&self, url: &str, limit: u64, operation: &str) -> Result<serde_json::Value> {
        let bytes = self.fetch_bytes(url, limit, operation).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AgsyncError::Network {
                operation: operation.to_string(),
                reason: format!("{url}: invalid JSON: {e}"),
            }
            .into()
        })
    }

    async fn get_once(&self, url: &str, limit: u64) -> std::result::Result<Vec<u8>, FetchError> {
        let mut response = self.client.get(url).send().await.map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge(limit));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(FetchError::Transport)? {
            if body.len() as u64 + chunk.len() as u64 > limit {
                return Err(FetchError::TooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 250,
            max_delay_ms: 1_000,
            timeout_secs: 1,
        };
        let delays: Vec<u64> = policy.delays().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![250, 500, 1_000, 1_000]);
    }

    #[test]
    fn test_single_attempt_has_no_delays() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delays().count(), 0);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(FetchError::Status(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(FetchError::Status(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!FetchError::Status(StatusCode::NOT_FOUND).is_retryable());
        assert!(!FetchError::TooLarge(1).is_retryable());
    }
}
