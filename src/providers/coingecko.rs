//! CoinGecko simple-price integration.
//!
//! API docs: https://docs.coingecko.com/reference/simple-price
//! Public base URL: https://api.coingecko.com/api/v3
//! Pro base URL: https://pro-api.coingecko.com/api/v3
//! Rate limit: aggressive on the public tier (expect 429s with Retry-After).
//! Auth: none for public; `x-cg-pro-api-key` header for pro.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use tracing::warn;

use super::{get_json, validate_price, QuoteSource};
use crate::types::{normalize_symbol, FetchError};

const PUBLIC_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";
pub const SOURCE_NAME: &str = "coingecko";

/// CoinGecko quote source. Maps token symbols to CoinGecko catalog ids.
pub struct CoinGeckoSource {
    http: Client,
    pro_key: Option<SecretString>,
    /// Symbol → CoinGecko id, e.g. "SOL" → "solana".
    ids: BTreeMap<String, String>,
}

impl CoinGeckoSource {
    pub fn new(ids: BTreeMap<String, String>, pro_key: Option<SecretString>) -> Result<Self> {
        if pro_key.is_none() {
            warn!("No CoinGecko pro key configured, using public API (heavy rate limits expected)");
        }

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("ARBWATCH/0.1.0")
            .build()
            .context("Failed to build CoinGecko HTTP client")?;

        let ids = ids
            .into_iter()
            .map(|(symbol, id)| (normalize_symbol(&symbol), id))
            .collect();

        Ok(Self { http, pro_key, ids })
    }

    fn base_url(&self) -> &'static str {
        if self.pro_key.is_some() {
            PRO_BASE_URL
        } else {
            PUBLIC_BASE_URL
        }
    }

    /// Extract `{ "<id>": { "usd": <price> } }`.
    fn parse_price(body: &serde_json::Value, coin_id: &str) -> Result<f64, FetchError> {
        let price = body
            .get(coin_id)
            .and_then(|entry| entry.get("usd"))
            .and_then(|usd| usd.as_f64())
            .ok_or_else(|| FetchError::InvalidResponse {
                provider: SOURCE_NAME.to_string(),
                message: format!("no usd price for {coin_id} in {body}"),
            })?;
        validate_price(SOURCE_NAME, price)
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn resolve(&self, token: &str) -> Option<String> {
        self.ids.get(token).cloned()
    }

    async fn request_price(&self, coin_id: &str) -> Result<f64, FetchError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url(),
            urlencoding::encode(coin_id),
        );

        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some(key) = &self.pro_key {
            request = request.header("x-cg-pro-api-key", key.expose_secret().as_str());
        }

        let body = get_json(SOURCE_NAME, request).await?;
        Self::parse_price(&body, coin_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
