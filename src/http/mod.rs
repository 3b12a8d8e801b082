use crate::error::HttpError;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, Response, StatusCode};
use std::time::Duration;

/// Retry rules for metadata requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub total: u32,
    pub backoff_factor: Duration,
    pub backoff_max: Duration,
    pub status_forcelist: Vec<u16>,
    pub allowed_methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total: 5,
            backoff_factor: Duration::from_secs(1),
            backoff_max: Duration::from_secs(120),
            status_forcelist: vec![429, 500, 502, 503, 504],
            allowed_methods: vec![Method::HEAD, Method::GET, Method::OPTIONS],
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.status_forcelist.contains(&status.as_u16())
    }

    #[must_use]
    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Delay before retry number `retry` (1-based). The first retry goes out
    /// immediately.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(16);
        self.backoff_factor
            .saturating_mul(1 << exponent)
            .min(self.backoff_max)
    }

    /// `Retry-After` only counts for 429 and 503
    fn retry_after(&self, response: &Response) -> Option<Duration> {
        if !matches!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return None;
        }
        let secs = response
            .headers()
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()?;
        Some(Duration::from_secs(secs).min(self.backoff_max))
    }
}

/// `reqwest` client that retries transient failures of idempotent requests
pub struct RetryingClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("client", &"Client { ... }")
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryingClient {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            policy,
        }
    }

    /// GET `url`, optionally with a bearer token
    pub async fn get(
        &self,
        url: &str,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<Response, HttpError> {
        self.send(Method::GET, url, bearer, timeout).await
    }

    /// Send a request, retrying transient statuses when the method allows it.
    ///
    /// # Errors
    /// - `HttpError::Request` on connection/timeout/transport failures (not retried)
    /// - `HttpError::RetriesExhausted` when every attempt returned a transient status
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<Response, HttpError> {
        let retries = if self.policy.allows_method(&method) {
            self.policy.total
        } else {
            0
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let mut request = self
                .client
                .request(method.clone(), url)
                .timeout(timeout);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();

            if !self.policy.is_retryable_status(status) {
                return Ok(response);
            }

            if attempt > retries {
                if retries == 0 {
                    return Ok(response);
                }
                return Err(HttpError::RetriesExhausted {
                    status: status.as_u16(),
                    attempts: attempt,
                });
            }

            let delay = self
                .policy
                .retry_after(&response)
                .unwrap_or_else(|| self.policy.backoff(attempt));
            tracing::debug!(
                "{method} {url} returned {status}, retry {attempt}/{retries} in {}ms",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
