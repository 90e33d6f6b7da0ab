//! Trade types produced by the PeerMatch matching engine.
//!
//! A [`Trade`] is the immutable record of a single fill between a buy and
//! a sell order, executed at the resting (maker) order's price. Trades are
//! append-only once created.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketPair, OrderId, TradeId, UserId};

/// A fill between two orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub market: MarketPair,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Execution price: always the maker's quoted price.
    pub price: Decimal,
    /// Executed quantity in base asset.
    pub amount: Decimal,
    /// Quote amount = price × amount.
    pub quote_amount: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} @ {} = {}",
            self.id, self.market, self.amount, self.price, self.quote_amount,
        )
    }
}
