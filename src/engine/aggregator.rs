//! Per-token price aggregation across all configured providers.
//!
//! Providers are queried one at a time, in configured order. A failing
//! provider only removes its own entry from the result.

use tracing::{debug, warn};

use crate::providers::PriceProvider;
use crate::types::{FetchError, SourceQuote};

pub struct PriceAggregator {
    providers: Vec<Box<dyn PriceProvider>>,
}

impl PriceAggregator {
    pub fn new(providers: Vec<Box<dyn PriceProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Collect one quote per provider for `token`, in provider order.
    ///
    /// May be partial or empty; fewer than two quotes means the token
    /// cannot be compared this cycle.
    pub async fn collect(&self, token: &str) -> Vec<SourceQuote> {
        let mut quotes: Vec<SourceQuote> = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            if quotes.iter().any(|q| q.source == provider.name()) {
                continue;
            }

            match provider.fetch_price(token).await {
                Ok(quote) => {
                    debug!(token, quote = %quote, "Price fetched");
                    quotes.push(quote);
                }
                Err(e @ FetchError::NotConfigured { .. }) => {
                    debug!(token, provider = provider.name(), error = %e, "Skipping provider");
                }
                Err(e) => {
                    warn!(token, provider = provider.name(), error = %e, "Price fetch failed");
                }
            }
        }

        quotes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
