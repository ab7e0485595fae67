//! Typed HTTP client for the relay API.
//!
//! Wraps `reqwest::Client` with the base URL, bot-token authentication, and
//! throttle handling: a token bucket is consulted before every request, and
//! 429 responses are retried after the server's `Retry-After` delay.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use chatdrive_core::config::RelayConfig;

use crate::rate_limit::{parse_retry_after, TokenBucket};

/// Default base URL for the relay REST API.
const RELAY_BASE_URL: &str = "https://relay.chatdrive.dev/api";

/// Wait applied when a 429 arrives without a `Retry-After` header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Attempts per request, counting the first one.
const MAX_ATTEMPTS: u32 = 4;

/// HTTP client for relay API calls.
pub struct RelayClient {
    client: Client,
    base_url: String,
    token: String,
    limiter: Option<Arc<TokenBucket>>,
}

impl RelayClient {
    /// Client against the production base URL.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, RELAY_BASE_URL)
    }

    /// Client against a custom base URL (useful for testing).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            limiter: None,
        }
    }

    /// Build a client from the relay configuration section.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .context("relay token is not configured")?;
        let mut client = Self::with_base_url(token, config.base_url.clone());
        client.limiter = Some(Arc::new(TokenBucket::new(
            config.burst,
            config.requests_per_second,
        )));
        Ok(client)
    }

    /// Attach a token bucket consulted before every request.
    pub fn with_rate_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Authenticated request builder for a path relative to the base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// The raw HTTP client, for absolute URLs outside the API base
    /// (attachment downloads go straight to the storage host).
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Send a request, throttling proactively and retrying on 429.
    ///
    /// The request body must be cloneable (buffered, not streamed) so the
    /// retry can resend it.
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        for attempt in 1..=MAX_ATTEMPTS {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }
            let attempt_request = request
                .try_clone()
                .context("request is not retryable (streaming body)")?;
            let response = attempt_request
                .send()
                .await
                .context("relay request failed")?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = parse_retry_after(response.headers()).unwrap_or(DEFAULT_RETRY_AFTER);
                warn!(
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "relay throttled the request, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            debug!(status = %response.status(), "relay response");
            return Ok(response);
        }
        unreachable!("loop returns on the final attempt")
    }
}
