//! Price providers.
//!
//! Defines the `PriceProvider` trait consumed by the aggregator, the
//! lower-level `QuoteSource` trait implemented per data source, and
//! `ResilientProvider`, which wraps a source with pacing, retry/backoff
//! and rate-limit cool-down.

pub mod birdeye;
pub mod coingecko;
pub mod policy;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{FetchError, SourceQuote};
pub use policy::{ProviderPolicy, RateLimitPolicy, RetryPolicy};

/// A price source as seen by the aggregator.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Source name, also used as the fee schedule key.
    fn name(&self) -> &str;

    /// Fetch the current USD price of `token`.
    async fn fetch_price(&self, token: &str) -> Result<SourceQuote, FetchError>;
}

/// A single external endpoint. One request per call, no retries.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    /// Source-specific identifier for a symbol (catalog id, mint address).
    /// `None` means the token (or the source itself) is not configured.
    fn resolve(&self, token: &str) -> Option<String>;

    async fn request_price(&self, source_id: &str) -> Result<f64, FetchError>;
}

// ---------------------------------------------------------------------------
// Resilient provider
// ---------------------------------------------------------------------------

/// Wraps a `QuoteSource` with the fetch policy.
pub struct ResilientProvider<S> {
    source: S,
    policy: ProviderPolicy,
}

impl<S: QuoteSource> ResilientProvider<S> {
    pub fn new(source: S, policy: ProviderPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: QuoteSource> PriceProvider for ResilientProvider<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn fetch_price(&self, token: &str) -> Result<SourceQuote, FetchError> {
        let source_id = self.source.resolve(token).ok_or_else(|| FetchError::NotConfigured {
            provider: self.name().to_string(),
            token: token.to_string(),
        })?;

        tokio::time::sleep(self.policy.pre_delay()).await;

        let max_attempts = self.policy.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.request_price(&source_id).await {
                Ok(price) => return Ok(SourceQuote::new(self.name(), price)),
                Err(FetchError::RateLimited { provider, retry_after }) => {
                    let wait = self.policy.rate_limit.cooldown(retry_after);
                    warn!(
                        provider = %provider,
                        token,
                        wait_secs = format!("{:.1}", wait.as_secs_f64()),
                        "Rate limit hit, cooling down"
                    );
                    tokio::time::sleep(wait).await;
                    return Err(FetchError::RateLimited { provider, retry_after });
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.retry.backoff_with_jitter(attempt);
                    debug!(
                        provider = self.name(),
                        token,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying price fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers shared by the concrete sources
// ---------------------------------------------------------------------------

/// Send a request and decode the body as JSON, mapping failures onto the
/// `FetchError` taxonomy.
pub(crate) async fn get_json(
    provider: &str,
    request: RequestBuilder,
) -> Result<serde_json::Value, FetchError> {
    let resp = request
        .send()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    let status = resp.status();
    if !status.is_success() {
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(status_error(provider, status, retry_after));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    serde_json::from_str(&body).map_err(|e| FetchError::InvalidResponse {
        provider: provider.to_string(),
        message: format!("body is not JSON: {e}"),
    })
}

/// Map a non-success HTTP status to a fetch error.
pub(crate) fn status_error(
    provider: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
) -> FetchError {
    let provider = provider.to_string();
    if status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::RateLimited { provider, retry_after }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        FetchError::Transient {
            provider,
            message: format!("HTTP {status}"),
        }
    } else {
        FetchError::InvalidResponse {
            provider,
            message: format!("HTTP {status}"),
        }
    }
}

fn transport_error(provider: &str, err: &reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::InvalidResponse {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else {
        FetchError::Transient {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Reject prices that are not finite and strictly positive.
pub(crate) fn validate_price(provider: &str, price: f64) -> Result<f64, FetchError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(FetchError::InvalidResponse {
            provider: provider.to_string(),
            message: format!("non-positive price {price}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
