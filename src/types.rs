//! Shared types for the ARBWATCH scanner.
//!
//! These types form the data model used across all modules so that
//! providers, the detector, the scheduler and the dashboard can depend
//! on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

/// Canonical form of a token symbol: trimmed and upper-cased.
///
/// Target lists and provider mappings both go through this, so a symbol
/// always looks up the same way on every source.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// A single price observation from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuote {
    /// Source identifier: "coingecko" | "birdeye" | ...
    pub source: String,
    /// USD price, always > 0.
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
}

impl SourceQuote {
    pub fn new(source: impl Into<String>, price: f64) -> Self {
        Self {
            source: source.into(),
            price,
            fetched_at: Utc::now(),
        }
    }
}

impl fmt::Display for SourceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=${:.6}", self.source, self.price)
    }
}

/// Prices gathered during one scan cycle: token → quotes in provider order.
///
/// Built fresh every cycle and never merged with a previous one.
#[derive(Debug, Clone, Default)]
pub struct PriceSet {
    tokens: BTreeMap<String, Vec<SourceQuote>>,
}

impl PriceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the quotes collected for a token. Empty lists are ignored.
    pub fn insert(&mut self, token: impl Into<String>, quotes: Vec<SourceQuote>) {
        if quotes.is_empty() {
            return;
        }
        self.tokens.insert(token.into(), quotes);
    }

    pub fn get(&self, token: &str) -> Option<&[SourceQuote]> {
        self.tokens.get(token).map(|q| q.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<SourceQuote>)> {
        self.tokens.iter()
    }

    /// Number of tokens with at least one quote.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Per-source fractional transaction fees.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    fees: HashMap<String, Decimal>,
    default_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(dec!(0.002))
            .with_fee("coingecko", dec!(0.002))
            .with_fee("birdeye", dec!(0.001))
    }
}

impl FeeSchedule {
    /// An empty schedule where every source pays `default_fee`.
    pub fn new(default_fee: Decimal) -> Self {
        Self {
            fees: HashMap::new(),
            default_fee,
        }
    }

    pub fn with_fee(mut self, source: impl Into<String>, fee: Decimal) -> Self {
        self.fees.insert(source.into(), fee);
        self
    }

    /// Fee for a source, falling back to the default rate.
    pub fn fee_for(&self, source: &str) -> Decimal {
        self.fees.get(source).copied().unwrap_or(self.default_fee)
    }

    pub fn default_fee(&self) -> Decimal {
        self.default_fee
    }
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// A fee-adjusted cross-source spread that cleared the profit threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub timestamp: DateTime<Utc>,
    pub token: String,
    pub buy_exchange: String,
    pub buy_price: f64,
    pub sell_exchange: String,
    pub sell_price: f64,
    /// Net gain after fees, in percent, rounded to 4 dp.
    pub profit_percent: Decimal,
}

impl fmt::Display for ArbitrageOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | Buy {} (${:.6}) Sell {} (${:.6}) | Profit: {:.2}%",
            self.token,
            self.buy_exchange,
            self.buy_price,
            self.sell_exchange,
            self.sell_price,
            self.profit_percent,
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// The session deadline passed.
    Normal,
    /// Nothing to scan: the resolved target set was empty.
    NoTargets,
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Initializing,
    Running,
    Finished(FinishReason),
}

impl SessionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionStatus::Finished(_))
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Initializing => write!(f, "Initializing"),
            SessionStatus::Running => write!(f, "Running Analysis"),
            SessionStatus::Finished(FinishReason::Normal) => write!(f, "Analysis Finished"),
            SessionStatus::Finished(FinishReason::NoTargets) => {
                write!(f, "Finished: No Tokens To Analyze")
            }
        }
    }
}

/// The single bounded scan run of this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    /// `start_time` + session duration.
    pub end_time: Option<DateTime<Utc>>,
    /// Ordered, deduplicated.
    pub target_tokens: Vec<String>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub opportunities_this_session: u64,
    pub cycles_completed: u64,
    /// Cycles dropped because the deadline passed before detection.
    pub cycles_discarded: u64,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            status: SessionStatus::Initializing,
            start_time: None,
            end_time: None,
            target_tokens: Vec::new(),
            last_scan_time: None,
            opportunities_this_session: 0,
            cycles_completed: 0,
            cycles_discarded: 0,
        }
    }
}

impl fmt::Display for ScanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | tokens={} | cycles={} (discarded {}) | opportunities={}",
            self.status,
            self.target_tokens.len(),
            self.cycles_completed,
            self.cycles_discarded,
            self.opportunities_this_session,
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure taxonomy for a single price fetch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Connection error, timeout or server-side failure. Retryable.
    #[error("Transient error ({provider}): {message}")]
    Transient { provider: String, message: String },

    /// The source asked us to slow down. Handled by cool-down, not retries.
    #[error("Rate limited ({provider}), retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    /// No source identifier (or credential) for this token on this provider.
    #[error("{token} not configured for {provider}")]
    NotConfigured { provider: String, token: String },

    /// Malformed or missing payload fields. Never retried.
    #[error("Invalid response ({provider}): {message}")]
    InvalidResponse { provider: String, message: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
