//! The order book for a single market pair.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (buys): `BTreeMap<Reverse<Decimal>, PriceLevel>` -- highest price first
//! - **Asks** (sells): `BTreeMap<Decimal, PriceLevel>` -- lowest price first
//!
//! An auxiliary `HashMap<OrderId, (Side, Price)>` enables O(log N) removal.
//!
//! Only limit orders rest here. Market orders are matched immediately by
//! the engine and never enter the book.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use peermatch_types::*;
use rust_decimal::Decimal;

use crate::price_level::PriceLevel;

/// The order book for a single market pair.
#[derive(Debug)]
pub struct OrderBook {
    /// The market this book serves (e.g., BTC/ZAR).
    pub market: MarketPair,
    /// Buy side: highest price first (`Reverse` key).
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    /// Sell side: lowest price first.
    asks: BTreeMap<Decimal, PriceLevel>,
    /// Fast lookup: `OrderId -> (side, price)` for O(log N) removal.
    index: HashMap<OrderId, (OrderSide, Decimal)>,
}

impl OrderBook {
    /// Create a new empty order book for the given market.
    #[must_use]
    pub fn new(market: MarketPair) -> Self {
        Self {
            market,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// Rest an unfilled limit order in the book at its limit price
    /// (back of the level: lowest time priority).
    ///
    /// # Errors
    /// Returns [`EngineError::DuplicateOrder`] if the ID is already
    /// resting, or [`EngineError::InvariantViolation`] for an order
    /// without a price (market orders never rest).
    pub fn insert_order(&mut self, order: Order) -> Result<()> {
        let price = self.admit(&order)?;
        self.level_mut(order.side, price).push_back(order);
        Ok(())
    }

    /// Re-insert an order at the FRONT of its price level, restoring the
    /// time priority it held before being popped by the matcher.
    ///
    /// # Errors
    /// Same conditions as [`Self::insert_order`].
    pub fn reinsert_front(&mut self, order: Order) -> Result<()> {
        let price = self.admit(&order)?;
        self.level_mut(order.side, price).orders.push_front(order);
        Ok(())
    }

    /// Validate and index an incoming order, returning its resting price.
    fn admit(&mut self, order: &Order) -> Result<Decimal> {
        if self.index.contains_key(&order.id) {
            return Err(EngineError::DuplicateOrder(order.id));
        }
        let price = order.price.ok_or_else(|| EngineError::InvariantViolation {
            reason: format!("order {} has no price and cannot rest in the book", order.id),
        })?;
        self.index.insert(order.id, (order.side, price));
        Ok(price)
    }

    fn level_mut(&mut self, side: OrderSide, price: Decimal) -> &mut PriceLevel {
        match side {
            OrderSide::Buy => self
                .bids
                .entry(Reverse(price))
                .or_insert_with(|| PriceLevel::new(price)),
            OrderSide::Sell => self
                .asks
                .entry(price)
                .or_insert_with(|| PriceLevel::new(price)),
        }
    }

    // =================================================================
    // Removal
    // =================================================================

    /// Remove an order by ID (cancel, expiry). Returns the removed order.
    ///
    /// # Errors
    /// Returns [`EngineError::OrderNotFound`] if the ID is not resting.
    pub fn remove_order(&mut self, order_id: &OrderId) -> Result<Order> {
        let (side, price) = self
            .index
            .remove(order_id)
            .ok_or(EngineError::OrderNotFound(*order_id))?;

        let order = match side {
            OrderSide::Buy => {
                let level = self
                    .bids
                    .get_mut(&Reverse(price))
                    .ok_or(EngineError::OrderNotFound(*order_id))?;
                let order = level
                    .remove_order(order_id)
                    .ok_or(EngineError::OrderNotFound(*order_id))?;
                if level.is_empty() {
                    self.bids.remove(&Reverse(price));
                }
                order
            }
            OrderSide::Sell => {
                let level = self
                    .asks
                    .get_mut(&price)
                    .ok_or(EngineError::OrderNotFound(*order_id))?;
                let order = level
                    .remove_order(order_id)
                    .ok_or(EngineError::OrderNotFound(*order_id))?;
                if level.is_empty() {
                    self.asks.remove(&price);
                }
                order
            }
        };

        Ok(order)
    }

    /// Pop the highest-priority order on the given side: the front order
    /// of the best price level. `None` if that side is empty.
    ///
    /// The matcher pops the best maker, fills against it, and either
    /// discards it (filled) or puts it back with [`Self::reinsert_front`].
    pub fn pop_best(&mut self, side: OrderSide) -> Option<Order> {
        let order = match side {
            OrderSide::Buy => {
                let (key, level) = self.bids.iter_mut().next()?;
                let key = *key;
                let order = level.pop_front()?;
                if level.is_empty() {
                    self.bids.remove(&key);
                }
                order
            }
            OrderSide::Sell => {
                let (key, level) = self.asks.iter_mut().next()?;
                let key = *key;
                let order = level.pop_front()?;
                if level.is_empty() {
                    self.asks.remove(&key);
                }
                order
            }
        };
        self.index.remove(&order.id);
        Some(order)
    }

    /// Peek at the highest-priority order on the given side.
    #[must_use]
    pub fn peek_best(&self, side: OrderSide) -> Option<&Order> {
        match side {
            OrderSide::Buy => self.bids.values().next()?.front(),
            OrderSide::Sell => self.asks.values().next()?.front(),
        }
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Best (highest) bid price, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) ask price, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Spread = best_ask - best_bid. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Mid price = (best_bid + best_ask) / 2. `None` if either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Total number of orders currently in the book.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct bid price levels.
    #[must_use]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of distinct ask price levels.
    #[must_use]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// Returns `true` if the book has no orders on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Check if an order rests in the book.
    #[must_use]
    pub fn contains_order(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    /// Look up a resting order by ID.
    #[must_use]
    pub fn get_order(&self, order_id: &OrderId) -> Option<&Order> {
        let (side, price) = self.index.get(order_id)?;
        let level = match side {
            OrderSide::Buy => self.bids.get(&Reverse(*price))?,
            OrderSide::Sell => self.asks.get(price)?,
        };
        level.orders.iter().find(|o| o.id == *order_id)
    }

    // =================================================================
    // Iteration (for depth aggregation)
    // =================================================================

    /// Iterate bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Iterate ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    // =================================================================
    // Maintenance
    // =================================================================

    /// IDs of all resting orders whose `expires_at` has passed.
    ///
    /// Full scan; sized for the sweep interval, not the hot path.
    #[must_use]
    pub fn expired_ids(&self, now: DateTime<Utc>) -> Vec<OrderId> {
        self.bids
            .values()
            .chain(self.asks.values())
            .flat_map(|level| level.orders.iter())
            .filter(|o| o.is_expired_at(now))
            .map(|o| o.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use peermatch_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn make_order(side: OrderSide, price: Decimal, amount: Decimal) -> Order {
        Order::dummy_limit(side, price, amount)
    }

    #[test]
    fn insert_and_query_best_bid_ask() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));

        book.insert_order(make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Buy, Decimal::new(99, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Sell, Decimal::new(101, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Sell, Decimal::new(102, 0), Decimal::ONE))
            .unwrap();

        assert_eq!(book.best_bid(), Some(Decimal::new(100, 0)));
        assert_eq!(book.best_ask(), Some(Decimal::new(101, 0)));
        assert_eq!(book.spread(), Some(Decimal::ONE));
        assert_eq!(book.order_count(), 4);
    }

    #[test]
    fn remove_order_clears_book() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let order = make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let id = order.id;

        book.insert_order(order).unwrap();
        assert_eq!(book.order_count(), 1);

        let removed = book.remove_order(&id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(book.order_count(), 0);
        assert!(book.is_empty());
    }

    #[test]
    fn remove_nonexistent_order() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let result = book.remove_order(&OrderId::new());
        assert!(matches!(result, Err(EngineError::OrderNotFound(_))));
    }

    #[test]
    fn remove_prunes_empty_level() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let order = make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let id = order.id;

        book.insert_order(order).unwrap();
        assert_eq!(book.bid_depth(), 1);

        book.remove_order(&id).unwrap();
        assert_eq!(book.bid_depth(), 0);
    }

    #[test]
    fn duplicate_order_rejected() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let order = make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let dup = order.clone();

        book.insert_order(order).unwrap();
        let result = book.insert_order(dup);
        assert!(matches!(result, Err(EngineError::DuplicateOrder(_))));
    }

    #[test]
    fn market_order_cannot_rest() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let order = Order::dummy_market(OrderSide::Buy, Decimal::ONE);
        let result = book.insert_order(order);
        assert!(matches!(result, Err(EngineError::InvariantViolation { .. })));
        assert!(book.is_empty());
    }

    #[test]
    fn pop_best_follows_price_then_time() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let first_at_100 = make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let second_at_100 = make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let at_99 = make_order(OrderSide::Buy, Decimal::new(99, 0), Decimal::ONE);
        let ids = [first_at_100.id, second_at_100.id, at_99.id];

        book.insert_order(at_99).unwrap();
        book.insert_order(first_at_100).unwrap();
        book.insert_order(second_at_100).unwrap();

        assert_eq!(book.pop_best(OrderSide::Buy).unwrap().id, ids[0]);
        assert_eq!(book.pop_best(OrderSide::Buy).unwrap().id, ids[1]);
        assert_eq!(book.pop_best(OrderSide::Buy).unwrap().id, ids[2]);
        assert!(book.pop_best(OrderSide::Buy).is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn reinsert_front_restores_priority() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let o1 = make_order(OrderSide::Sell, Decimal::new(100, 0), Decimal::ONE);
        let o2 = make_order(OrderSide::Sell, Decimal::new(100, 0), Decimal::ONE);
        let id1 = o1.id;

        book.insert_order(o1).unwrap();
        book.insert_order(o2).unwrap();

        let popped = book.pop_best(OrderSide::Sell).unwrap();
        assert_eq!(popped.id, id1);
        book.reinsert_front(popped).unwrap();

        assert_eq!(book.peek_best(OrderSide::Sell).unwrap().id, id1);
        assert_eq!(book.order_count(), 2);
    }

    #[test]
    fn bid_levels_iterate_highest_first() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        book.insert_order(make_order(OrderSide::Buy, Decimal::new(90, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Buy, Decimal::new(95, 0), Decimal::ONE))
            .unwrap();

        let prices: Vec<Decimal> = book.bid_levels().map(|l| l.price).collect();
        assert_eq!(
            prices,
            vec![Decimal::new(100, 0), Decimal::new(95, 0), Decimal::new(90, 0)]
        );
    }

    #[test]
    fn ask_levels_iterate_lowest_first() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        book.insert_order(make_order(OrderSide::Sell, Decimal::new(110, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Sell, Decimal::new(101, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Sell, Decimal::new(105, 0), Decimal::ONE))
            .unwrap();

        let prices: Vec<Decimal> = book.ask_levels().map(|l| l.price).collect();
        assert_eq!(
            prices,
            vec![Decimal::new(101, 0), Decimal::new(105, 0), Decimal::new(110, 0)]
        );
    }

    #[test]
    fn mid_price_calculation() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        book.insert_order(make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE))
            .unwrap();
        book.insert_order(make_order(OrderSide::Sell, Decimal::new(102, 0), Decimal::ONE))
            .unwrap();
        assert_eq!(book.mid_price(), Some(Decimal::new(101, 0)));
    }

    #[test]
    fn expired_ids_finds_stale_orders() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let now = chrono::Utc::now();

        let mut stale = make_order(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        stale.expires_at = Some(now - chrono::Duration::seconds(10));
        let stale_id = stale.id;

        let mut live = make_order(OrderSide::Sell, Decimal::new(101, 0), Decimal::ONE);
        live.expires_at = Some(now + chrono::Duration::seconds(60));

        let forever = make_order(OrderSide::Sell, Decimal::new(102, 0), Decimal::ONE);

        book.insert_order(stale).unwrap();
        book.insert_order(live).unwrap();
        book.insert_order(forever).unwrap();

        assert_eq!(book.expired_ids(now), vec![stale_id]);
    }

    #[test]
    fn get_order_returns_resting_order() {
        let mut book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        let order = make_order(OrderSide::Sell, Decimal::new(100, 0), Decimal::new(3, 0));
        let id = order.id;
        book.insert_order(order).unwrap();

        let found = book.get_order(&id).unwrap();
        assert_eq!(found.remaining_amount, Decimal::new(3, 0));
        assert!(book.get_order(&OrderId::new()).is_none());
    }

    #[test]
    fn empty_book() {
        let book = OrderBook::new(MarketPair::new("BTC", "ZAR"));
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.spread(), None);
        assert_eq!(book.mid_price(), None);
        assert!(book.peek_best(OrderSide::Buy).is_none());
    }
}
