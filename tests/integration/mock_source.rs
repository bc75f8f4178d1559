//! Mock quote source for integration testing.
//!
//! A deterministic `QuoteSource` with per-token prices, a request log,
//! and a switch to force a given failure. All in-memory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbwatch::providers::{PriceProvider, ProviderPolicy, QuoteSource, ResilientProvider};
use arbwatch::types::FetchError;

/// What the next requests should fail with, if anything.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transient,
    RateLimited,
    Invalid,
}

#[derive(Clone)]
pub struct MockSource {
    name: String,
    prices: Arc<Mutex<HashMap<String, f64>>>,
    requests: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<Failure>>>,
    latency: Duration,
}

impl MockSource {
    pub fn new(name: &str, prices: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            prices: Arc::new(Mutex::new(
                prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
            )),
            requests: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_price(&self, token: &str, price: f64) {
        self.prices.lock().unwrap().insert(token.to_string(), price);
    }

    pub fn fail_with(&self, failure: Option<Failure>) {
        *self.failure.lock().unwrap() = failure;
    }

    /// Source ids requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Wrap a handle to this source with a zero-wait policy.
    pub fn provider(&self) -> Box<dyn PriceProvider> {
        Box::new(ResilientProvider::new(self.clone(), ProviderPolicy::immediate()))
    }
}

#[async_trait]
impl QuoteSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Source ids are lower-cased symbols; unknown symbols are unmapped.
    fn resolve(&self, token: &str) -> Option<String> {
        self.prices
            .lock()
            .unwrap()
            .contains_key(token)
            .then(|| token.to_lowercase())
    }

    async fn request_price(&self, source_id: &str) -> Result<f64, FetchError> {
        self.requests.lock().unwrap().push(source_id.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failure = *self.failure.lock().unwrap();
        let provider = self.name.clone();
        match failure {
            Some(Failure::Transient) => Err(FetchError::Transient {
                provider,
                message: "connection reset".into(),
            }),
            Some(Failure::RateLimited) => Err(FetchError::RateLimited {
                provider,
                retry_after: None,
            }),
            Some(Failure::Invalid) => Err(FetchError::InvalidResponse {
                provider,
                message: "missing price field".into(),
            }),
            None => self
                .prices
                .lock()
                .unwrap()
                .get(&source_id.to_uppercase())
                .copied()
                .ok_or(FetchError::InvalidResponse {
                    provider,
                    message: format!("no price for {source_id}"),
                }),
        }
    }
}
