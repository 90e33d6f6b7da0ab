//! Read-only market depth projections.
//!
//! [`MarketDepth`] is never authoritative state: it is always derivable
//! from live order book contents, and readers accept a slightly stale
//! snapshot in exchange for never blocking the matching path.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketPair, OrderSide};

/// One aggregated price level of resting liquidity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    /// Sum of remaining amounts of all orders at this price.
    pub amount: Decimal,
    /// Number of resting orders at this price.
    pub orders: usize,
}

/// Aggregated view of resting order volume by price level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDepth {
    pub market: MarketPair,
    /// Buy levels, best (highest) price first.
    pub bids: Vec<DepthLevel>,
    /// Sell levels, best (lowest) price first.
    pub asks: Vec<DepthLevel>,
    pub captured_at: DateTime<Utc>,
}

impl MarketDepth {
    #[must_use]
    pub fn empty(market: MarketPair) -> Self {
        Self {
            market,
            bids: Vec::new(),
            asks: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Mid price = (best bid + best ask) / 2. `None` if either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Total resting base amount on one side of the snapshot.
    #[must_use]
    pub fn liquidity(&self, side: OrderSide) -> Decimal {
        let levels = match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        };
        levels.iter().map(|l| l.amount).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// How much resting liquidity backs a price suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Advisory price for placing a competitive order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSuggestion {
    /// The side the suggestion is for.
    pub side: OrderSide,
    /// Suggested price, `None` when the opposing side is empty.
    pub price: Option<Decimal>,
    /// Best opposing price the suggestion was derived from.
    pub reference: Option<Decimal>,
    pub confidence: Confidence,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_depth() -> MarketDepth {
        MarketDepth {
            market: MarketPair::new("BTC", "ZAR"),
            bids: vec![
                DepthLevel {
                    price: Decimal::new(100, 0),
                    amount: Decimal::new(2, 0),
                    orders: 2,
                },
                DepthLevel {
                    price: Decimal::new(99, 0),
                    amount: Decimal::ONE,
                    orders: 1,
                },
            ],
            asks: vec![DepthLevel {
                price: Decimal::new(102, 0),
                amount: Decimal::new(3, 0),
                orders: 1,
            }],
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn best_prices() {
        let depth = sample_depth();
        assert_eq!(depth.best_bid(), Some(Decimal::new(100, 0)));
        assert_eq!(depth.best_ask(), Some(Decimal::new(102, 0)));
        assert_eq!(depth.mid_price(), Some(Decimal::new(101, 0)));
    }

    #[test]
    fn liquidity_sums_levels() {
        let depth = sample_depth();
        assert_eq!(depth.liquidity(OrderSide::Buy), Decimal::new(3, 0));
        assert_eq!(depth.liquidity(OrderSide::Sell), Decimal::new(3, 0));
    }

    #[test]
    fn empty_depth() {
        let depth = MarketDepth::empty(MarketPair::new("BTC", "ZAR"));
        assert!(depth.is_empty());
        assert_eq!(depth.best_bid(), None);
        assert_eq!(depth.mid_price(), None);
        assert_eq!(depth.liquidity(OrderSide::Buy), Decimal::ZERO);
    }

    #[test]
    fn confidence_ordering() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }
}
