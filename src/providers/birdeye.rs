//! Birdeye on-chain price integration (Solana).
//!
//! API docs: https://docs.birdeye.so/reference/get_defi-price
//! Base URL: https://public-api.birdeye.so
//! Auth: `X-API-KEY` header (required).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{get_json, validate_price, QuoteSource};
use crate::types::{normalize_symbol, FetchError};

const BASE_URL: &str = "https://public-api.birdeye.so";
pub const SOURCE_NAME: &str = "birdeye";

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<PriceData>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    #[serde(default)]
    value: Option<f64>,
}

/// Birdeye quote source. Maps token symbols to Solana mint addresses.
pub struct BirdeyeSource {
    http: Client,
    api_key: SecretString,
    /// Symbol → mint address.
    addresses: BTreeMap<String, String>,
}

impl BirdeyeSource {
    /// Birdeye rejects unauthenticated requests, so the key is required.
    pub fn new(addresses: BTreeMap<String, String>, api_key: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("ARBWATCH/0.1.0")
            .build()
            .context("Failed to build Birdeye HTTP client")?;

        let addresses = addresses
            .into_iter()
            .map(|(symbol, address)| (normalize_symbol(&symbol), address))
            .collect();

        Ok(Self {
            http,
            api_key,
            addresses,
        })
    }

    fn parse_price(body: serde_json::Value) -> Result<f64, FetchError> {
        let invalid = |message: String| FetchError::InvalidResponse {
            provider: SOURCE_NAME.to_string(),
            message,
        };

        let resp: PriceResponse =
            serde_json::from_value(body).map_err(|e| invalid(format!("unexpected shape: {e}")))?;

        if !resp.success {
            return Err(invalid("success=false".into()));
        }

        let price = resp
            .data
            .and_then(|d| d.value)
            .ok_or_else(|| invalid("missing data.value".into()))?;

        validate_price(SOURCE_NAME, price)
    }
}

#[async_trait]
impl QuoteSource for BirdeyeSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn resolve(&self, token: &str) -> Option<String> {
        self.addresses.get(token).cloned()
    }

    async fn request_price(&self, address: &str) -> Result<f64, FetchError> {
        let url = format!("{BASE_URL}/defi/price?address={}", urlencoding::encode(address));
        let request = self
            .http
            .get(&url)
            .header("X-API-KEY", self.api_key.expose_secret().as_str())
            .header("x-chain", "solana");

        let body = get_json(SOURCE_NAME, request).await?;
        Self::parse_price(body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
