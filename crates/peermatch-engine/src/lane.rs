//! Per-market pair lanes.
//!
//! Each market runs as one tokio task owning its [`OrderBook`]. All
//! mutations arrive as commands over an mpsc channel, so book access is
//! serialized without locking; custody lives in the shared
//! [`ReservationService`], locked only for the duration of a command.
//!
//! After every mutation the lane publishes a fresh depth snapshot to a
//! watch channel. Depth and suggestion reads clone the latest snapshot
//! and never touch the lane.
//!
//! A fatal error (invariant violation, settlement drift) halts the lane:
//! it keeps draining commands but answers everything with `LaneHalted`.
//! Other lanes are unaffected.

use std::sync::Arc;

use chrono::Utc;
use peermatch_types::{
    EngineConfig, EngineError, EngineEvent, MarketConfig, MarketDepth, MarketOrderPolicy,
    MarketPair, Order, OrderId, OrderSide, OrderType, ReservationRequirement, Result, Trade,
    UserId,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info};

use peermatch_book::{OrderBook, depth_snapshot, eligible_liquidity, market_buy_quote};
use peermatch_ledger::ReservationService;

use crate::matcher::{MatchAbort, match_order};
use crate::store::{OrderStore, TradeLog};

pub(crate) enum LaneCommand {
    Place {
        order: Order,
        reply: oneshot::Sender<Result<Order>>,
    },
    Cancel {
        order_id: OrderId,
        user_id: UserId,
        reply: oneshot::Sender<Result<Order>>,
    },
    /// Expiry sweep tick from the supervisor. Fire and forget.
    Sweep,
}

/// Handle to a running pair lane.
pub struct PairLane {
    market: MarketPair,
    tx: mpsc::Sender<LaneCommand>,
    depth_rx: watch::Receiver<MarketDepth>,
}

impl PairLane {
    /// Spawn the lane task for one market.
    pub(crate) fn spawn(
        market_cfg: MarketConfig,
        config: &EngineConfig,
        reservations: Arc<Mutex<ReservationService>>,
        orders: Arc<Mutex<OrderStore>>,
        trades: Arc<Mutex<TradeLog>>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let market = market_cfg.pair();
        let (tx, rx) = mpsc::channel(config.lane_queue_depth);
        let (depth_tx, depth_rx) = watch::channel(MarketDepth::empty(market.clone()));

        let state = LaneState {
            book: OrderBook::new(market.clone()),
            market_cfg,
            policy: config.market_order_policy,
            allow_self_match: config.allow_self_match,
            depth_levels: config.depth_levels,
            reservations,
            orders,
            trades,
            events,
            depth_tx,
            sequence: 0,
            halted: false,
        };
        tokio::spawn(state.run(rx));

        Self {
            market,
            tx,
            depth_rx,
        }
    }

    pub fn market(&self) -> &MarketPair {
        &self.market
    }

    pub(crate) fn command_sender(&self) -> mpsc::Sender<LaneCommand> {
        self.tx.clone()
    }

    /// Submit an admitted order for reservation and matching.
    pub async fn place(&self, order: Order) -> Result<Order> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LaneCommand::Place { order, reply })
            .await
            .map_err(|_| EngineError::LaneClosed)?;
        rx.await.map_err(|_| EngineError::LaneClosed)?
    }

    /// Cancel a resting order on behalf of its owner.
    pub async fn cancel(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LaneCommand::Cancel {
                order_id,
                user_id,
                reply,
            })
            .await
            .map_err(|_| EngineError::LaneClosed)?;
        rx.await.map_err(|_| EngineError::LaneClosed)?
    }

    /// Latest published depth snapshot. Never blocks on the lane.
    #[must_use]
    pub fn depth(&self) -> MarketDepth {
        self.depth_rx.borrow().clone()
    }
}

/// Errors that mean lane state can no longer be trusted.
fn is_fatal(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::InvariantViolation { .. }
            | EngineError::ReservationNotFound(_)
            | EngineError::ReservationNotActive { .. }
            | EngineError::TradeAlreadySettled(_)
            | EngineError::DuplicateOrder(_)
    )
}

struct LaneState {
    book: OrderBook,
    market_cfg: MarketConfig,
    policy: MarketOrderPolicy,
    allow_self_match: bool,
    depth_levels: usize,
    reservations: Arc<Mutex<ReservationService>>,
    orders: Arc<Mutex<OrderStore>>,
    trades: Arc<Mutex<TradeLog>>,
    events: broadcast::Sender<EngineEvent>,
    depth_tx: watch::Sender<MarketDepth>,
    sequence: u64,
    halted: bool,
}

impl LaneState {
    async fn run(mut self, mut rx: mpsc::Receiver<LaneCommand>) {
        info!(market = %self.book.market, "lane started");
        while let Some(cmd) = rx.recv().await {
            match cmd {
                LaneCommand::Place { order, reply } => {
                    let result = self.handle_place(order).await;
                    self.note_fatal(&result);
                    let _ = reply.send(result);
                }
                LaneCommand::Cancel {
                    order_id,
                    user_id,
                    reply,
                } => {
                    let result = self.handle_cancel(order_id, user_id).await;
                    self.note_fatal(&result);
                    let _ = reply.send(result);
                }
                LaneCommand::Sweep => self.handle_sweep().await,
            }
        }
        info!(market = %self.book.market, "lane stopped");
    }

    fn note_fatal(&mut self, result: &Result<Order>) {
        if let Err(err) = result {
            if is_fatal(err) && !self.halted {
                error!(market = %self.book.market, error = %err, "lane halted");
                self.halted = true;
            }
        }
    }

    fn halted_err(&self) -> EngineError {
        EngineError::LaneHalted(self.book.market.clone())
    }

    // ====================================================================
    // Place
    // ====================================================================

    async fn handle_place(&mut self, mut order: Order) -> Result<Order> {
        if self.halted {
            return Err(self.halted_err());
        }
        self.sequence += 1;
        order.sequence = self.sequence;

        let requirement = self.reservation_for(&order)?;
        {
            let mut reservations = self.reservations.lock().await;
            reservations.reserve_for_order(&order, requirement)?;
        }

        let result = {
            let mut reservations = self.reservations.lock().await;
            match_order(&mut self.book, &mut reservations, order, self.allow_self_match)
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(aborted) => {
                // Fills settled before the failure already moved money;
                // their trade records and events must survive the halt.
                let MatchAbort { error, outcome } = *aborted;
                self.persist(&outcome.maker_updates, &outcome.taker, &outcome.trades)
                    .await;
                for event in outcome.events {
                    let _ = self.events.send(event);
                }
                self.publish_depth();
                return Err(error);
            }
        };
        let mut taker = outcome.taker;
        let mut events = outcome.events;

        // Remainder disposition.
        match taker.order_type {
            OrderType::Limit if taker.remaining_amount > Decimal::ZERO => {
                self.book.insert_order(taker.clone())?;
            }
            OrderType::Limit => {
                let mut reservations = self.reservations.lock().await;
                reservations.release_remainder(&taker.id)?;
            }
            OrderType::Market => {
                if taker.remaining_amount > Decimal::ZERO {
                    let from = taker.status;
                    taker.cancel()?;
                    debug!(
                        order_id = %taker.id,
                        remainder = %taker.remaining_amount,
                        "market order remainder cancelled"
                    );
                    events.push(EngineEvent::status_changed(
                        taker.id,
                        taker.user_id,
                        taker.market.clone(),
                        from,
                        taker.status,
                    ));
                }
                let mut reservations = self.reservations.lock().await;
                reservations.release_remainder(&taker.id)?;
            }
        }

        self.persist(&outcome.maker_updates, &taker, &outcome.trades)
            .await;
        for event in events {
            let _ = self.events.send(event);
        }
        self.publish_depth();
        Ok(taker)
    }

    /// What to lock for an incoming order, with liquidity admission for
    /// market orders.
    fn reservation_for(&self, order: &Order) -> Result<ReservationRequirement> {
        let exclude = if self.allow_self_match {
            None
        } else {
            Some(order.user_id)
        };

        match order.reservation_requirement() {
            Some(req) => {
                if order.order_type == OrderType::Market {
                    // Market sell: covered by resting bids.
                    let liquidity = eligible_liquidity(&self.book, OrderSide::Buy, exclude);
                    self.check_market_coverage(liquidity, order.original_amount)?;
                }
                Ok(req)
            }
            None => {
                // Market buy: quote cost depends on the asks it will walk.
                let (fillable, cost) =
                    market_buy_quote(&self.book, order.original_amount, exclude);
                self.check_market_coverage(fillable, order.original_amount)?;
                Ok(ReservationRequirement {
                    asset: self.market_cfg.quote.clone(),
                    amount: cost,
                })
            }
        }
    }

    fn check_market_coverage(&self, available: Decimal, amount: Decimal) -> Result<()> {
        if available.is_zero() {
            return Err(EngineError::NoLiquidity);
        }
        if self.policy == MarketOrderPolicy::RejectOnPartial && available < amount {
            return Err(EngineError::NoLiquidity);
        }
        Ok(())
    }

    // ====================================================================
    // Cancel
    // ====================================================================

    async fn handle_cancel(&mut self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        if self.halted {
            return Err(self.halted_err());
        }

        let owner = self
            .book
            .get_order(&order_id)
            .ok_or(EngineError::OrderNotFound(order_id))?
            .user_id;
        if owner != user_id {
            return Err(EngineError::Forbidden { order_id });
        }

        let mut order = self.book.remove_order(&order_id)?;
        let from = order.status;
        order.cancel()?;
        {
            let mut reservations = self.reservations.lock().await;
            reservations.release_remainder(&order.id)?;
        }

        debug!(order_id = %order.id, user = %user_id, "order cancelled");
        {
            let mut orders = self.orders.lock().await;
            orders.upsert(order.clone());
        }
        let _ = self.events.send(EngineEvent::status_changed(
            order.id,
            order.user_id,
            order.market.clone(),
            from,
            order.status,
        ));
        self.publish_depth();
        Ok(order)
    }

    // ====================================================================
    // Expiry sweep
    // ====================================================================

    async fn handle_sweep(&mut self) {
        if self.halted {
            return;
        }
        let now = Utc::now();
        let expired = self.book.expired_ids(now);
        if expired.is_empty() {
            return;
        }

        let count = expired.len();
        for order_id in expired {
            if let Err(err) = self.expire_one(order_id).await {
                error!(market = %self.book.market, order_id = %order_id, error = %err, "lane halted");
                self.halted = true;
                return;
            }
        }
        info!(market = %self.book.market, count, "expired orders swept");
        self.publish_depth();
    }

    async fn expire_one(&mut self, order_id: OrderId) -> Result<()> {
        let mut order = self.book.remove_order(&order_id)?;
        let from = order.status;
        order.expire()?;
        {
            let mut reservations = self.reservations.lock().await;
            reservations.release_remainder(&order.id)?;
        }
        {
            let mut orders = self.orders.lock().await;
            orders.upsert(order.clone());
        }
        let _ = self.events.send(EngineEvent::status_changed(
            order.id,
            order.user_id,
            order.market.clone(),
            from,
            order.status,
        ));
        Ok(())
    }

    // ====================================================================
    // Persistence and publishing
    // ====================================================================

    async fn persist(&self, maker_updates: &[Order], taker: &Order, trades: &[Trade]) {
        {
            let mut orders = self.orders.lock().await;
            for maker in maker_updates {
                orders.upsert(maker.clone());
            }
            orders.upsert(taker.clone());
        }
        if !trades.is_empty() {
            let mut log = self.trades.lock().await;
            for trade in trades {
                log.record(trade.clone());
            }
        }
    }

    fn publish_depth(&self) {
        let snapshot = depth_snapshot(&self.book, self.depth_levels, Utc::now());
        let _ = self.depth_tx.send(snapshot);
    }
}
