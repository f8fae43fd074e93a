//! HTTP transport: retries, fixed-header injection, request-id tagging.
//!
//! The transport is the only component that touches `reqwest` verbs.
//! Every request goes through [`Transport::execute`], which composes
//! three orthogonal behaviors:
//!
//! - **Retries**: `429` and `5xx` responses and connection errors are
//!   retried with the policy in [`crate::retry`]; other statuses return
//!   on the first attempt.
//! - **Header injection**: fixed headers (auth, API version) set at
//!   construction are attached to every request.
//! - **Request-id tagging**: each call gets a fresh `x-request-id` so a
//!   request can be correlated across retries and vendor logs.
//!
//! The transport is shared across calls and safe for concurrent use.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::retry::{RetryConfig, is_retryable_status};
use crate::{Error, Result};

/// Header carrying the per-call correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP round-trip executor shared by all providers.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    headers: HeaderMap,
    retry: RetryConfig,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    /// Creates a transport with default retry policy and no fixed
    /// headers.
    pub fn new() -> Self {
        Transport {
            client: reqwest::Client::new(),
            headers: HeaderMap::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Replaces the underlying `reqwest` client (e.g. to set timeouts or
    /// proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Adds a fixed header sent on every request.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the name or value is not a legal
    /// HTTP header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::try_from(name)
            .map_err(|e| Error::validation(format!("bad header name {name:?}: {e}")))?;
        let value = HeaderValue::try_from(value)
            .map_err(|e| Error::validation(format!("bad header value for {name:?}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Executes one logical request, retrying transient failures.
    ///
    /// Returns the response whatever its status; non-200 classification
    /// is the provider's job. A connection-level failure is returned
    /// only after the retry budget is exhausted.
    pub async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let request_id = fresh_request_id();
        let mut last_status: Option<StatusCode> = None;
        let mut last_err: Option<reqwest::Error> = None;

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt - 1);
                debug!(%url, attempt, ?delay, "retrying request");
                sleep(delay).await;
            }

            let mut req = self
                .client
                .request(method.clone(), url)
                .headers(self.headers.clone())
                .header(REQUEST_ID_HEADER, &request_id);
            if let Some(b) = body {
                req = req.json(b);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if is_retryable_status(status) && attempt + 1 < self.retry.max_attempts {
                        warn!(%url, %status, attempt, "retryable status");
                        last_status = Some(status);
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    warn!(%url, attempt, error = %e, "request failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(Error::Network(e)),
            // Retry budget spent on retryable statuses but the final
            // attempt also failed to produce a keepable response; this
            // arm is unreachable because the last attempt returns the
            // response unconditionally, kept for totality.
            None => Err(Error::stream(format!(
                "retries exhausted at {url} (last status {last_status:?})"
            ))),
        }
    }

    /// Convenience wrapper for a request with a custom per-call timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self.with_client(client)
    }
}

fn fresh_request_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}
