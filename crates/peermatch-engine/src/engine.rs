//! Engine facade.
//!
//! [`MatchingEngine`] wires the shared custody ledger, the per-market
//! lanes, and the expiry supervisor together, and validates order
//! parameters before anything reaches a lane.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use peermatch_types::{
    Balance, EngineConfig, EngineError, EngineEvent, MarketConfig, MarketDepth, MarketPair, Order,
    OrderId, OrderSide, OrderStatus, OrderType, PriceSuggestion, Result, Trade, UserId, constants,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::info;

use peermatch_book::suggest_price;
use peermatch_ledger::ReservationService;

use crate::lane::PairLane;
use crate::store::{OrderStore, TradeLog};
use crate::supervisor;

/// The top-level matching engine.
///
/// One instance owns every pair lane plus the shared ledger. Cloning is
/// deliberately not offered; share it behind an `Arc` if multiple tasks
/// need access.
pub struct MatchingEngine {
    config: EngineConfig,
    lanes: HashMap<MarketPair, PairLane>,
    reservations: Arc<Mutex<ReservationService>>,
    orders: Arc<Mutex<OrderStore>>,
    trades: Arc<Mutex<TradeLog>>,
    events: broadcast::Sender<EngineEvent>,
    sweeper: JoinHandle<()>,
}

impl MatchingEngine {
    /// Validate the config, spawn one lane per market and start the
    /// expiry supervisor.
    ///
    /// # Errors
    /// Returns [`EngineError::Configuration`] if the config is invalid.
    pub fn start(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let reservations = Arc::new(Mutex::new(ReservationService::new(
            config.settled_cache_size,
        )));
        let orders = Arc::new(Mutex::new(OrderStore::new()));
        let trades = Arc::new(Mutex::new(TradeLog::new()));
        let (events, _) = broadcast::channel(constants::DEFAULT_EVENT_CHANNEL_CAPACITY);

        let mut lanes = HashMap::new();
        let mut senders = Vec::with_capacity(config.markets.len());
        for market_cfg in &config.markets {
            let lane = PairLane::spawn(
                market_cfg.clone(),
                &config,
                Arc::clone(&reservations),
                Arc::clone(&orders),
                Arc::clone(&trades),
                events.clone(),
            );
            senders.push(lane.command_sender());
            lanes.insert(lane.market().clone(), lane);
        }

        let sweeper = supervisor::spawn_sweeper(
            senders,
            Duration::from_millis(config.expiry_scan_interval_ms),
        );

        info!(
            markets = lanes.len(),
            version = constants::VERSION,
            "matching engine started"
        );
        Ok(Self {
            config,
            lanes,
            reservations,
            orders,
            trades,
            events,
            sweeper,
        })
    }

    // ====================================================================
    // Order entry
    // ====================================================================

    /// Place a limit order. Resolves once the lane has reserved funds,
    /// matched what crosses and rested any remainder.
    ///
    /// # Errors
    /// [`EngineError::UnknownMarket`], [`EngineError::InvalidParameters`],
    /// [`EngineError::InsufficientFunds`] or [`EngineError::LaneHalted`].
    pub async fn place_limit_order(
        &self,
        user_id: UserId,
        market: &MarketPair,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Order> {
        let lane = self.lane(market)?;
        self.admit(market, amount, Some(price), expires_at)?;
        let order = Order {
            id: OrderId::new(),
            user_id,
            market: market.clone(),
            side,
            order_type: OrderType::Limit,
            status: OrderStatus::Pending,
            price: Some(price),
            original_amount: amount,
            remaining_amount: amount,
            sequence: 0,
            created_at: Utc::now(),
            expires_at,
        };
        lane.place(order).await
    }

    /// Place a market order. Fills immediately against resting liquidity;
    /// the unmatched remainder follows the configured
    /// [`MarketOrderPolicy`](peermatch_types::MarketOrderPolicy).
    ///
    /// # Errors
    /// [`EngineError::UnknownMarket`], [`EngineError::InvalidParameters`],
    /// [`EngineError::NoLiquidity`], [`EngineError::InsufficientFunds`] or
    /// [`EngineError::LaneHalted`].
    pub async fn place_market_order(
        &self,
        user_id: UserId,
        market: &MarketPair,
        side: OrderSide,
        amount: Decimal,
    ) -> Result<Order> {
        let lane = self.lane(market)?;
        self.admit(market, amount, None, None)?;
        let order = Order {
            id: OrderId::new(),
            user_id,
            market: market.clone(),
            side,
            order_type: OrderType::Market,
            status: OrderStatus::Pending,
            price: None,
            original_amount: amount,
            remaining_amount: amount,
            sequence: 0,
            created_at: Utc::now(),
            expires_at: None,
        };
        lane.place(order).await
    }

    /// Cancel a resting order owned by `user_id`.
    ///
    /// # Errors
    /// [`EngineError::OrderNotFound`] if the order does not rest in any
    /// book, [`EngineError::Forbidden`] if it belongs to someone else.
    pub async fn cancel_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let market = {
            let orders = self.orders.lock().await;
            orders
                .get(&order_id)
                .map(|order| order.market.clone())
                .ok_or(EngineError::OrderNotFound(order_id))?
        };
        let lane = self.lane(&market)?;
        lane.cancel(order_id, user_id).await
    }

    // ====================================================================
    // Market data
    // ====================================================================

    /// Latest depth snapshot for a market.
    pub fn market_depth(&self, market: &MarketPair) -> Result<MarketDepth> {
        Ok(self.lane(market)?.depth())
    }

    /// Suggest a price for a new order from current depth.
    pub fn suggest_price(&self, market: &MarketPair, side: OrderSide) -> Result<PriceSuggestion> {
        let depth = self.lane(market)?.depth();
        Ok(suggest_price(
            &depth,
            side,
            self.config.suggest_spread(),
            self.config.high_confidence_orders,
            self.config.medium_confidence_orders,
        ))
    }

    /// Most recent trades across all markets, newest first.
    pub async fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.trades.lock().await.recent(limit)
    }

    // ====================================================================
    // Per-user queries
    // ====================================================================

    /// An order by id, from the order archive.
    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.lock().await.get(&order_id).cloned()
    }

    /// Every order the user ever placed, newest first.
    pub async fn order_history(&self, user_id: UserId) -> Vec<Order> {
        self.orders.lock().await.for_user(user_id)
    }

    /// The user's still-open orders, newest first.
    pub async fn open_orders(&self, user_id: UserId) -> Vec<Order> {
        self.orders.lock().await.open_for_user(user_id)
    }

    /// Trades the user participated in, newest first.
    pub async fn trade_history(&self, user_id: UserId, limit: usize) -> Vec<Trade> {
        self.trades.lock().await.for_user(user_id, limit)
    }

    // ====================================================================
    // Custody
    // ====================================================================

    /// Credit a user's available balance.
    pub async fn deposit(&self, user_id: UserId, asset: &str, amount: Decimal) {
        self.reservations.lock().await.deposit(user_id, asset, amount);
    }

    /// Debit a user's available balance.
    ///
    /// # Errors
    /// [`EngineError::InsufficientFunds`] if locked plus available does
    /// not cover the amount.
    pub async fn withdraw(&self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        self.reservations.lock().await.withdraw(user_id, asset, amount)
    }

    /// The user's balance in one asset.
    pub async fn balance(&self, user_id: UserId, asset: &str) -> Balance {
        self.reservations.lock().await.balance(user_id, asset)
    }

    /// Sum of all user balances in one asset.
    pub async fn total_supply(&self, asset: &str) -> Decimal {
        self.reservations.lock().await.total_supply(asset)
    }

    /// Audit every tracked asset for supply drift.
    ///
    /// # Errors
    /// [`EngineError::InvariantViolation`] naming the drifted asset.
    pub async fn verify_supplies(&self) -> Result<()> {
        self.reservations.lock().await.verify_all_supplies()
    }

    // ====================================================================
    // Events
    // ====================================================================

    /// Subscribe to the engine event stream. Slow subscribers that fall
    /// more than the channel capacity behind see `Lagged` and skip ahead.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Markets with an open lane.
    #[must_use]
    pub fn markets(&self) -> Vec<MarketPair> {
        self.lanes.keys().cloned().collect()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ====================================================================
    // Internals
    // ====================================================================

    fn lane(&self, market: &MarketPair) -> Result<&PairLane> {
        self.lanes
            .get(market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))
    }

    fn market_config(&self, market: &MarketPair) -> Result<&MarketConfig> {
        self.config
            .markets
            .iter()
            .find(|cfg| &cfg.pair() == market)
            .ok_or_else(|| EngineError::UnknownMarket(market.clone()))
    }

    /// Parameter validation shared by both entry points. Runs before any
    /// funds are touched.
    fn admit(
        &self,
        market: &MarketPair,
        amount: Decimal,
        price: Option<Decimal>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let market_cfg = self.market_config(market)?;
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidParameters {
                reason: format!("amount must be positive, got {amount}"),
            });
        }
        if amount < market_cfg.min_order_size {
            return Err(EngineError::InvalidParameters {
                reason: format!(
                    "amount {amount} below minimum {} for {market}",
                    market_cfg.min_order_size
                ),
            });
        }
        if let Some(price) = price {
            if price <= Decimal::ZERO {
                return Err(EngineError::InvalidParameters {
                    reason: format!("price must be positive, got {price}"),
                });
            }
        }
        if let Some(expiry) = expires_at {
            if expiry <= Utc::now() {
                return Err(EngineError::InvalidParameters {
                    reason: "expiry is in the past".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Drop for MatchingEngine {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}
