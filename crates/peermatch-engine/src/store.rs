//! In-memory order and trade records.
//!
//! Lanes write the latest state of every order they touch here; history
//! queries read from it without going through a lane. Terminal orders
//! stay queryable, only the book itself drops them.

use std::collections::HashMap;

use peermatch_types::{Order, OrderId, Trade, UserId};

/// All orders the engine has accepted, keyed by ID, with a per-user index.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: HashMap<OrderId, Order>,
    by_user: HashMap<UserId, Vec<OrderId>>,
}

impl OrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new order or overwrite an existing one with newer state.
    pub fn upsert(&mut self, order: Order) {
        if !self.orders.contains_key(&order.id) {
            self.by_user.entry(order.user_id).or_default().push(order.id);
        }
        self.orders.insert(order.id, order);
    }

    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// A user's orders, most recent first.
    #[must_use]
    pub fn for_user(&self, user_id: UserId) -> Vec<Order> {
        let Some(ids) = self.by_user.get(&user_id) else {
            return Vec::new();
        };
        ids.iter()
            .rev()
            .filter_map(|id| self.orders.get(id))
            .cloned()
            .collect()
    }

    /// A user's orders still open in some lane, most recent first.
    #[must_use]
    pub fn open_for_user(&self, user_id: UserId) -> Vec<Order> {
        self.for_user(user_id)
            .into_iter()
            .filter(Order::is_open)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Append-only log of executed trades with a per-user index.
#[derive(Debug, Default)]
pub struct TradeLog {
    trades: Vec<Trade>,
    by_user: HashMap<UserId, Vec<usize>>,
}

impl TradeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: Trade) {
        let idx = self.trades.len();
        self.by_user.entry(trade.buyer_id).or_default().push(idx);
        if trade.seller_id != trade.buyer_id {
            self.by_user.entry(trade.seller_id).or_default().push(idx);
        }
        self.trades.push(trade);
    }

    /// Trades a user took part in, most recent first, capped at `limit`.
    #[must_use]
    pub fn for_user(&self, user_id: UserId, limit: usize) -> Vec<Trade> {
        let Some(indices) = self.by_user.get(&user_id) else {
            return Vec::new();
        };
        indices
            .iter()
            .rev()
            .take(limit)
            .map(|&i| self.trades[i].clone())
            .collect()
    }

    /// Most recent trades across all users, most recent first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<Trade> {
        self.trades.iter().rev().take(limit).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use peermatch_types::{MarketPair, OrderSide, OrderStatus, TradeId};
    use rust_decimal::Decimal;

    use super::*;

    fn make_trade(buyer_id: UserId, seller_id: UserId) -> Trade {
        Trade {
            id: TradeId::new(),
            market: MarketPair::new("BTC", "ZAR"),
            buy_order_id: OrderId::new(),
            sell_order_id: OrderId::new(),
            buyer_id,
            seller_id,
            price: Decimal::new(100, 0),
            amount: Decimal::ONE,
            quote_amount: Decimal::new(100, 0),
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_replaces_state() {
        let mut store = OrderStore::new();
        let mut order = Order::dummy_limit(OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let id = order.id;

        store.upsert(order.clone());
        order.cancel().unwrap();
        store.upsert(order);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).unwrap().status, OrderStatus::Cancelled);
    }

    #[test]
    fn user_history_is_newest_first() {
        let mut store = OrderStore::new();
        let user = UserId::new();
        let first =
            Order::dummy_limit_for_user(user, OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let second =
            Order::dummy_limit_for_user(user, OrderSide::Sell, Decimal::new(110, 0), Decimal::ONE);
        let first_id = first.id;
        let second_id = second.id;

        store.upsert(first);
        store.upsert(second);

        let history = store.for_user(user);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second_id);
        assert_eq!(history[1].id, first_id);
        assert!(store.for_user(UserId::new()).is_empty());
    }

    #[test]
    fn open_orders_exclude_terminal() {
        let mut store = OrderStore::new();
        let user = UserId::new();
        let open =
            Order::dummy_limit_for_user(user, OrderSide::Buy, Decimal::new(100, 0), Decimal::ONE);
        let mut done =
            Order::dummy_limit_for_user(user, OrderSide::Buy, Decimal::new(99, 0), Decimal::ONE);
        done.cancel().unwrap();
        let open_id = open.id;

        store.upsert(open);
        store.upsert(done);

        let open_orders = store.open_for_user(user);
        assert_eq!(open_orders.len(), 1);
        assert_eq!(open_orders[0].id, open_id);
    }

    #[test]
    fn trade_log_indexes_both_parties() {
        let mut log = TradeLog::new();
        let buyer = UserId::new();
        let seller = UserId::new();
        log.record(make_trade(buyer, seller));

        assert_eq!(log.for_user(buyer, 10).len(), 1);
        assert_eq!(log.for_user(seller, 10).len(), 1);
        assert!(log.for_user(UserId::new(), 10).is_empty());
    }

    #[test]
    fn trade_log_limits_and_orders_newest_first() {
        let mut log = TradeLog::new();
        let user = UserId::new();
        let other = UserId::new();
        let first = make_trade(user, other);
        let second = make_trade(user, other);
        let second_id = second.id;

        log.record(first);
        log.record(second);

        let trades = log.for_user(user, 1);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id, second_id);
        assert_eq!(log.recent(10).len(), 2);
        assert_eq!(log.recent(10)[0].id, second_id);
    }
}
