//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::*;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use crate::types::{normalize_symbol, FeeSchedule};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub session: SessionSettings,
    pub arbitrage: ArbitrageSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    pub providers: ProvidersConfig,
    pub dashboard: DashboardConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    pub duration_minutes: u64,
    pub scan_interval_secs: u64,
    pub token_pause_ms: u64,
    /// JSON file produced by the token discovery agent.
    pub candidates_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArbitrageSettings {
    pub min_profit_percent: f64,
    pub default_fee: f64,
    #[serde(default)]
    pub fees: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    pub pre_delay_min_ms: u64,
    pub pre_delay_max_ms: u64,
    pub rate_limit_default_secs: u64,
    pub cooldown_jitter_min_ms: u64,
    pub cooldown_jitter_max_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter_ms: 1_000,
            pre_delay_min_ms: 2_000,
            pre_delay_max_ms: 5_000,
            rate_limit_default_secs: 45,
            cooldown_jitter_min_ms: 1_000,
            cooldown_jitter_max_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: CoinGeckoConfig,
    pub birdeye: BirdeyeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoinGeckoConfig {
    pub enabled: bool,
    /// Env var holding a pro key. Public API is used when unset.
    pub pro_api_key_env: Option<String>,
    /// Symbol → CoinGecko id.
    #[serde(default)]
    pub ids: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BirdeyeConfig {
    pub enabled: bool,
    pub api_key_env: String,
    /// Symbol → Solana mint address.
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub path: String,
}

impl ArbitrageSettings {
    /// Fees must be fractions in `[0, 1)`, the threshold a non-negative
    /// percentage.
    pub fn validate(&self) -> Result<()> {
        if !self.min_profit_percent.is_finite() || self.min_profit_percent < 0.0 {
            bail!(
                "arbitrage.min_profit_percent must be a non-negative number, got {}",
                self.min_profit_percent
            );
        }
        check_fee("arbitrage.default_fee", self.default_fee)?;
        for (source, fee) in &self.fees {
            check_fee(&format!("arbitrage.fees.{source}"), *fee)?;
        }
        Ok(())
    }

    pub fn fee_schedule(&self) -> Result<FeeSchedule> {
        let mut schedule = FeeSchedule::new(to_decimal("arbitrage.default_fee", self.default_fee)?);
        for (source, fee) in &self.fees {
            schedule = schedule.with_fee(source, to_decimal(&format!("arbitrage.fees.{source}"), *fee)?);
        }
        Ok(schedule)
    }

    pub fn min_profit(&self) -> Result<Decimal> {
        to_decimal("arbitrage.min_profit_percent", self.min_profit_percent)
    }
}

fn check_fee(name: &str, fee: f64) -> Result<()> {
    if fee.is_finite() && (0.0..1.0).contains(&fee) {
        Ok(())
    } else {
        bail!("{name} must be a fraction in [0, 1), got {fee}")
    }
}

fn to_decimal(name: &str, value: f64) -> Result<Decimal> {
    Decimal::from_f64(value).with_context(|| format!("{name} is not representable: {value}"))
}

/// Re-key a symbol mapping by canonical symbol, dropping blank keys.
fn normalize_keys(map: BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.into_iter()
        .map(|(symbol, id)| (normalize_symbol(&symbol), id))
        .filter(|(symbol, _)| !symbol.is_empty())
        .collect()
}

impl SessionSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_minutes * 60)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse, normalise mapping keys and validate.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(contents)?;

        let ids = std::mem::take(&mut config.providers.coingecko.ids);
        config.providers.coingecko.ids = normalize_keys(ids);
        let addresses = std::mem::take(&mut config.providers.birdeye.addresses);
        config.providers.birdeye.addresses = normalize_keys(addresses);

        config.arbitrage.validate()?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve an optional secret; unset or empty variables yield `None`.
    pub fn resolve_secret(env_name: Option<&str>) -> Option<SecretString> {
        env_name
            .and_then(|name| Self::resolve_env(name).ok())
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::new)
    }

    /// Symbols mapped by every enabled provider, in sorted order.
    ///
    /// These are always scanned, whatever the discovery agent proposes.
    pub fn known_tokens(&self) -> Vec<String> {
        let mut mappings = Vec::new();
        if self.providers.coingecko.enabled {
            mappings.push(&self.providers.coingecko.ids);
        }
        if self.providers.birdeye.enabled {
            mappings.push(&self.providers.birdeye.addresses);
        }

        let Some((first, rest)) = mappings.split_first() else {
            return Vec::new();
        };

        first
            .keys()
            .filter(|symbol| rest.iter().all(|m| m.contains_key(*symbol)))
            .cloned()
            .collect()
    }
}
