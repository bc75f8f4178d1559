//! Fee-adjusted cross-source arbitrage detection.
//!
//! For every token with at least two quotes, each unordered pair of
//! sources is checked in both directions. Buying inflates the quote by
//! the buy-side fee, selling deflates it by the sell-side fee. The first
//! direction that clears the threshold is reported and the pair is done
//! for the cycle.
//!
//! All arithmetic is decimal so the threshold comparison is exact.

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use tracing::info;

use crate::types::{ArbitrageOpportunity, FeeSchedule, PriceSet, SourceQuote};

/// Decimal places kept in `profit_percent`.
const PROFIT_DP: u32 = 4;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub fees: FeeSchedule,
    /// Inclusive minimum net gain, in percent.
    pub min_profit_percent: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            min_profit_percent: dec!(0.5),
        }
    }
}

pub struct ArbitrageDetector {
    config: DetectorConfig,
}

impl ArbitrageDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Scan one cycle's prices and return qualifying opportunities in
    /// detection order.
    pub fn detect(&self, prices: &PriceSet) -> Vec<ArbitrageOpportunity> {
        let mut opportunities = Vec::new();
        let mut processed: HashSet<(String, String, String)> = HashSet::new();

        for (token, quotes) in prices.iter() {
            if quotes.len() < 2 {
                continue;
            }

            for (i, a) in quotes.iter().enumerate() {
                for b in &quotes[i + 1..] {
                    let key = pair_key(token, &a.source, &b.source);
                    if processed.contains(&key) {
                        continue;
                    }

                    let found = self
                        .evaluate(token, a, b)
                        .or_else(|| self.evaluate(token, b, a));

                    if let Some(opp) = found {
                        info!(
                            token = %opp.token,
                            buy = %opp.buy_exchange,
                            sell = %opp.sell_exchange,
                            profit_pct = %opp.profit_percent,
                            "ARB: {opp}"
                        );
                        opportunities.push(opp);
                        processed.insert(key);
                    }
                }
            }
        }

        opportunities
    }

    /// Check a single direction: buy on `buy`, sell on `sell`.
    fn evaluate(
        &self,
        token: &str,
        buy: &SourceQuote,
        sell: &SourceQuote,
    ) -> Option<ArbitrageOpportunity> {
        let profit = self.net_profit_percent(buy, sell)?;
        if profit < self.config.min_profit_percent {
            return None;
        }

        Some(ArbitrageOpportunity {
            timestamp: Utc::now(),
            token: token.to_string(),
            buy_exchange: buy.source.clone(),
            buy_price: buy.price,
            sell_exchange: sell.source.clone(),
            sell_price: sell.price,
            profit_percent: profit
                .round_dp_with_strategy(PROFIT_DP, RoundingStrategy::MidpointAwayFromZero),
        })
    }

    /// Unrounded net gain of buying on `buy` and selling on `sell`, or
    /// `None` when the fee-adjusted sell price does not exceed the
    /// fee-adjusted buy price.
    pub fn net_profit_percent(&self, buy: &SourceQuote, sell: &SourceQuote) -> Option<Decimal> {
        let buy_price = Decimal::from_f64(buy.price)?;
        let sell_price = Decimal::from_f64(sell.price)?;

        let effective_buy =
            buy_price.checked_mul(Decimal::ONE + self.config.fees.fee_for(&buy.source))?;
        let effective_sell =
            sell_price.checked_mul(Decimal::ONE - self.config.fees.fee_for(&sell.source))?;

        if effective_buy <= Decimal::ZERO || effective_sell <= effective_buy {
            return None;
        }

        let ratio = effective_sell.checked_div(effective_buy)?;
        Some((ratio - Decimal::ONE) * dec!(100))
    }
}

/// (token, lower source, higher source), independent of direction.
fn pair_key(token: &str, a: &str, b: &str) -> (String, String, String) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (token.to_string(), lo.to_string(), hi.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ArbitrageDetector {
        ArbitrageDetector::new(DetectorConfig::default())
    }

    fn zero_fee_detector() -> ArbitrageDetector {
        ArbitrageDetector::new(DetectorConfig {
            fees: FeeSchedule::new(Decimal::ZERO),
            min_profit_percent: dec!(0.5),
        })
    }

    fn prices(entries: Vec<(&str, Vec<(&str, f64)>)>) -> PriceSet {
        let mut set = PriceSet::new();
        for (token, quotes) in entries {
            set.insert(
                token,
                quotes.into_iter().map(|(s, p)| SourceQuote::new(s, p)).collect(),
            );
        }
        set
    }

    #[test]
    fn test_sol_scenario() {
        let set = prices(vec![("SOL", vec![("coingecko", 100.0), ("birdeye", 102.0)])]);
        let opps = detector().detect(&set);

        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.token, "SOL");
        assert_eq!(opp.buy_exchange, "coingecko");
        assert_eq!(opp.sell_exchange, "birdeye");
        assert!((opp.buy_price - 100.0).abs() < 1e-12);
        assert!((opp.sell_price - 102.0).abs() < 1e-12);
        // 101.898 / 100.2 - 1
        assert_eq!(opp.profit_percent, dec!(1.6946));
    }

    #[test]
    fn test_reverse_direction_detected() {
        let set = prices(vec![("SOL", vec![("coingecko", 102.0), ("birdeye", 100.0)])]);
        let opps = detector().detect(&set);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].buy_exchange, "birdeye");
        assert_eq!(opps[0].sell_exchange, "coingecko");
    }

    #[test]
    fn test_single_source_yields_nothing() {
        let set = prices(vec![("SOL", vec![("coingecko", 100.0)])]);
        assert!(detector().detect(&set).is_empty());
    }

    #[test]
    fn test_spread_eaten_by_fees() {
        // 0.4% raw spread, 0.3% in fees
        let set = prices(vec![("SOL", vec![("coingecko", 100.0), ("birdeye", 100.4)])]);
        assert!(detector().detect(&set).is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let set = prices(vec![("SOL", vec![("a", 100.0), ("b", 100.5)])]);
        let opps = zero_fee_detector().detect(&set);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].profit_percent, dec!(0.5));

        let set = prices(vec![("SOL", vec![("a", 100.0), ("b", 100.49)])]);
        assert!(zero_fee_detector().detect(&set).is_empty());
    }

    #[test]
    fn test_unknown_source_uses_default_fee() {
        let d = detector();
        let buy = SourceQuote::new("jupiter", 100.0);
        let sell = SourceQuote::new("birdeye", 101.0);
        // 101 * 0.999 / (100 * 1.002) - 1
        let profit = d.net_profit_percent(&buy, &sell).unwrap();
        assert_eq!(
            profit.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero),
            dec!(0.6976)
        );
    }

    #[test]
    fn test_one_opportunity_per_pair_even_if_both_directions_qualify() {
        // Negative fees (rebates) let both directions clear the bar.
        let d = ArbitrageDetector::new(DetectorConfig {
            fees: FeeSchedule::new(dec!(-0.05)),
            min_profit_percent: dec!(0.5),
        });
        let set = prices(vec![("SOL", vec![("a", 100.0), ("b", 101.0)])]);
        let opps = d.detect(&set);
        assert_eq!(opps.len(), 1);
        // buy-A/sell-B is evaluated first
        assert_eq!(opps[0].buy_exchange, "a");
        assert_eq!(opps[0].sell_exchange, "b");
    }

    #[test]
    fn test_three_sources_give_at_most_three_pairs() {
        let set = prices(vec![("JTO", vec![("a", 2.00), ("b", 2.10), ("c", 2.20)])]);
        let opps = zero_fee_detector().detect(&set);
        assert_eq!(opps.len(), 3);

        let mut pairs: Vec<(String, String)> = opps
            .iter()
            .map(|o| {
                let mut p = [o.buy_exchange.clone(), o.sell_exchange.clone()];
                p.sort();
                (p[0].clone(), p[1].clone())
            })
            .collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_multiple_tokens_independent() {
        let set = prices(vec![
            ("SOL", vec![("coingecko", 100.0), ("birdeye", 102.0)]),
            ("JTO", vec![("coingecko", 2.0)]),
            ("PYTH", vec![("coingecko", 0.40), ("birdeye", 0.40)]),
        ]);
        let opps = detector().detect(&set);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].token, "SOL");
    }

    #[test]
    fn test_reported_opportunities_clear_threshold() {
        let d = detector();
        let fees = FeeSchedule::default();
        let quotes = [
            (100.0, 100.9),
            (100.0, 101.0),
            (50.0, 50.4),
            (0.0123, 0.0125),
            (1.0, 0.98),
            (250.0, 253.3),
        ];
        for (pa, pb) in quotes {
            let set = prices(vec![("T", vec![("coingecko", pa), ("birdeye", pb)])]);
            for opp in d.detect(&set) {
                let buy = Decimal::from_f64(opp.buy_price).unwrap()
                    * (Decimal::ONE + fees.fee_for(&opp.buy_exchange));
                let sell = Decimal::from_f64(opp.sell_price).unwrap()
                    * (Decimal::ONE - fees.fee_for(&opp.sell_exchange));
                assert!(sell / buy - Decimal::ONE >= dec!(0.005), "{opp}");
            }
        }
    }

    #[test]
    fn test_zero_price_is_excluded() {
        let d = zero_fee_detector();
        let buy = SourceQuote::new("a", 0.0);
        let sell = SourceQuote::new("b", 10.0);
        assert!(d.net_profit_percent(&buy, &sell).is_none());
    }

    #[test]
    fn test_pair_key_is_direction_independent() {
        assert_eq!(pair_key("SOL", "b", "a"), pair_key("SOL", "a", "b"));
    }
}
