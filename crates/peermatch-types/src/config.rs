//! Configuration types for the PeerMatch engine and its markets.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EngineError, MarketPair, Result, constants};

/// What happens to a market order's unmatched remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarketOrderPolicy {
    /// Fill what the book covers, cancel the remainder and release its
    /// reservation leftover.
    #[default]
    CancelRemainder,
    /// Reject the whole order up front if resting liquidity cannot cover it.
    RejectOnPartial,
}

/// Per-market configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Base asset (e.g., "BTC").
    pub base: String,
    /// Fiat quote currency (e.g., "ZAR").
    pub quote: String,
    /// Minimum order size in base asset.
    pub min_order_size: Decimal,
}

impl MarketConfig {
    /// Create a default BTC/ZAR market config.
    #[must_use]
    pub fn btc_zar() -> Self {
        Self {
            base: "BTC".to_string(),
            quote: "ZAR".to_string(),
            min_order_size: Decimal::new(1, 5), // 0.00001 BTC
        }
    }

    /// Create a default ETH/ZAR market config.
    #[must_use]
    pub fn eth_zar() -> Self {
        Self {
            base: "ETH".to_string(),
            quote: "ZAR".to_string(),
            min_order_size: Decimal::new(1, 4), // 0.0001 ETH
        }
    }

    #[must_use]
    pub fn pair(&self) -> MarketPair {
        MarketPair::new(self.base.clone(), self.quote.clone())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Markets the engine opens a lane for.
    pub markets: Vec<MarketConfig>,
    /// Depth levels per side in snapshots.
    pub depth_levels: usize,
    /// Price-suggestion spread in basis points.
    pub suggest_spread_bps: i64,
    /// Resting opposing orders for HIGH confidence.
    pub high_confidence_orders: usize,
    /// Resting opposing orders for MEDIUM confidence.
    pub medium_confidence_orders: usize,
    /// Interval between expiry sweeps, in milliseconds.
    pub expiry_scan_interval_ms: u64,
    /// Remainder policy for market orders.
    pub market_order_policy: MarketOrderPolicy,
    /// Whether one user may take both sides of a fill. Off by default.
    pub allow_self_match: bool,
    /// Command queue depth per pair lane.
    pub lane_queue_depth: usize,
    /// Settlement idempotency cache size.
    pub settled_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            markets: vec![MarketConfig::btc_zar(), MarketConfig::eth_zar()],
            depth_levels: constants::DEFAULT_DEPTH_LEVELS,
            suggest_spread_bps: constants::DEFAULT_SUGGEST_SPREAD_BPS,
            high_confidence_orders: constants::DEFAULT_HIGH_CONFIDENCE_ORDERS,
            medium_confidence_orders: constants::DEFAULT_MEDIUM_CONFIDENCE_ORDERS,
            expiry_scan_interval_ms: constants::DEFAULT_EXPIRY_SCAN_INTERVAL_MS,
            market_order_policy: MarketOrderPolicy::default(),
            allow_self_match: false,
            lane_queue_depth: constants::DEFAULT_LANE_QUEUE_DEPTH,
            settled_cache_size: constants::SETTLED_TRADE_CACHE_SIZE,
        }
    }
}

impl EngineConfig {
    /// The suggestion spread as a decimal fraction (10 bps -> 0.001).
    #[must_use]
    pub fn suggest_spread(&self) -> Decimal {
        Decimal::new(self.suggest_spread_bps, 4)
    }

    /// Validate the configuration before the engine starts.
    pub fn validate(&self) -> Result<()> {
        if self.markets.is_empty() {
            return Err(EngineError::Configuration(
                "at least one market is required".into(),
            ));
        }
        if self.depth_levels == 0 {
            return Err(EngineError::Configuration(
                "depth_levels must be > 0".into(),
            ));
        }
        if self.settled_cache_size == 0 {
            return Err(EngineError::Configuration(
                "settled_cache_size must be > 0".into(),
            ));
        }
        if self.lane_queue_depth == 0 {
            return Err(EngineError::Configuration(
                "lane_queue_depth must be > 0".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for market in &self.markets {
            if market.base == market.quote {
                return Err(EngineError::Configuration(format!(
                    "market {} trades an asset against itself",
                    market.pair()
                )));
            }
            if market.min_order_size <= Decimal::ZERO {
                return Err(EngineError::Configuration(format!(
                    "market {} has non-positive min_order_size",
                    market.pair()
                )));
            }
            if !seen.insert(market.pair()) {
                return Err(EngineError::Configuration(format!(
                    "duplicate market {}",
                    market.pair()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.depth_levels, 10);
        assert!(!cfg.allow_self_match);
    }

    #[test]
    fn spread_fraction() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.suggest_spread(), Decimal::new(1, 3)); // 0.001
    }

    #[test]
    fn market_config_btc_zar() {
        let cfg = MarketConfig::btc_zar();
        assert_eq!(cfg.pair().symbol(), "BTC/ZAR");
        assert!(cfg.min_order_size > Decimal::ZERO);
    }

    #[test]
    fn self_quoted_market_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.markets.push(MarketConfig {
            base: "ZAR".into(),
            quote: "ZAR".into(),
            min_order_size: Decimal::ONE,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_market_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.markets.push(MarketConfig::btc_zar());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn no_markets_rejected() {
        let cfg = EngineConfig {
            markets: vec![],
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.markets.len(), cfg.markets.len());
        assert_eq!(back.suggest_spread_bps, cfg.suggest_spread_bps);
    }
}
