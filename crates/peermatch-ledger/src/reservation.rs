//! Balance reservation service — the single mutation path for funds.
//!
//! Every order that may spend funds first obtains a reservation, which
//! locks the covering amount in the ledger. Fills settle against the
//! reservations of both counterparties atomically: the settlement is
//! validated in full before any balance is touched, so a failed
//! settlement leaves the ledger exactly as it was.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use peermatch_types::{
    Asset, Balance, EngineError, Order, OrderId, Reservation, ReservationRequirement, Result,
    Trade, UserId,
};

use crate::idempotency::SettledTrades;
use crate::store::LedgerStore;

/// Custody service combining the ledger with per-order reservations and
/// settlement idempotency.
pub struct ReservationService {
    ledger: LedgerStore,
    reservations: std::collections::HashMap<OrderId, Reservation>,
    settled: SettledTrades,
}

impl ReservationService {
    #[must_use]
    pub fn new(settled_cache_size: usize) -> Self {
        Self {
            ledger: LedgerStore::new(),
            reservations: std::collections::HashMap::new(),
            settled: SettledTrades::new(settled_cache_size),
        }
    }

    // ========================================================================
    // Deposits, withdrawals, balance queries
    // ========================================================================

    /// Credit a user with freshly deposited funds.
    pub fn deposit(&mut self, user_id: UserId, asset: &str, amount: Decimal) {
        self.ledger.deposit(user_id, asset, amount);
    }

    /// Withdraw available (unlocked) funds.
    ///
    /// # Errors
    /// Returns [`EngineError::InsufficientFunds`] if the user's available
    /// balance does not cover `amount`.
    pub fn withdraw(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        self.ledger.withdraw(user_id, asset, amount)
    }

    #[must_use]
    pub fn balance(&self, user_id: UserId, asset: &str) -> Balance {
        self.ledger.balance(user_id, asset)
    }

    #[must_use]
    pub fn total_supply(&self, asset: &str) -> Decimal {
        self.ledger.total_supply(asset)
    }

    /// Check that circulating supply matches the deposit/withdrawal record.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] on a mismatch.
    pub fn verify_supply(&self, asset: &str) -> Result<()> {
        self.ledger.verify_supply(asset)
    }

    /// Verify conservation for every asset the ledger has seen.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] for the first asset
    /// whose supply does not reconcile.
    pub fn verify_all_supplies(&self) -> Result<()> {
        self.ledger.verify_all_supplies()
    }

    // ========================================================================
    // Reservations
    // ========================================================================

    /// Reserve funds for an order, locking them in the ledger.
    ///
    /// # Errors
    /// Returns [`EngineError::InsufficientFunds`] if the user's available
    /// balance does not cover the requirement, or
    /// [`EngineError::InvariantViolation`] if the order already holds a
    /// reservation.
    pub fn reserve_for_order(
        &mut self,
        order: &Order,
        requirement: ReservationRequirement,
    ) -> Result<peermatch_types::ReservationId> {
        if self.reservations.contains_key(&order.id) {
            return Err(EngineError::InvariantViolation {
                reason: format!("order {} already holds a reservation", order.id),
            });
        }

        self.ledger
            .lock(order.user_id, &requirement.asset, requirement.amount)?;

        let reservation = Reservation::new(
            order.id,
            order.user_id,
            requirement.asset.clone(),
            requirement.amount,
        );
        let reservation_id = reservation.id;
        debug!(
            order_id = %order.id,
            reservation_id = %reservation_id,
            asset = %requirement.asset,
            amount = %requirement.amount,
            "funds reserved"
        );
        self.reservations.insert(order.id, reservation);
        Ok(reservation_id)
    }

    /// The active reservation backing an order, if any.
    #[must_use]
    pub fn reservation(&self, order_id: &OrderId) -> Option<&Reservation> {
        self.reservations.get(order_id)
    }

    /// Release the unconsumed remainder of an order's reservation back to
    /// the user's available balance. Returns the amount unlocked.
    ///
    /// Safe to call for fully consumed reservations (returns zero).
    ///
    /// # Errors
    /// Returns [`EngineError::ReservationNotFound`] if the order holds no
    /// reservation, or [`EngineError::ReservationNotActive`] if it was
    /// already released.
    pub fn release_remainder(&mut self, order_id: &OrderId) -> Result<Decimal> {
        let reservation = self
            .reservations
            .get_mut(order_id)
            .ok_or(EngineError::ReservationNotFound(*order_id))?;

        let user_id = reservation.user_id;
        let asset = reservation.asset.clone();
        let remainder = reservation.release()?;

        if remainder > Decimal::ZERO {
            self.ledger.unlock(user_id, &asset, remainder)?;
        }
        debug!(order_id = %order_id, asset = %asset, remainder = %remainder, "reservation released");
        Ok(remainder)
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Settle a trade: move the base asset from seller to buyer and the
    /// quote asset from buyer to seller, consuming both reservations.
    ///
    /// The trade is validated in full before any balance is mutated. On
    /// error, the ledger and both reservations are unchanged.
    ///
    /// # Errors
    /// Returns [`EngineError::TradeAlreadySettled`] on a replay,
    /// [`EngineError::ReservationNotFound`] or
    /// [`EngineError::ReservationNotActive`] if either side's reservation
    /// is missing or spent, and [`EngineError::InvariantViolation`] if a
    /// reservation or locked balance does not cover its leg.
    pub fn settle_fill(&mut self, trade: &Trade) -> Result<()> {
        if self.settled.is_settled(&trade.id) {
            warn!(trade_id = %trade.id, "rejected duplicate settlement");
            return Err(EngineError::TradeAlreadySettled(trade.id));
        }

        let base = &trade.market.base;
        let quote = &trade.market.quote;

        // Validate both legs before touching the ledger.
        self.check_leg(&trade.sell_order_id, base, trade.amount)?;
        self.check_leg(&trade.buy_order_id, quote, trade.quote_amount)?;

        // Base leg: seller -> buyer.
        self.ledger.debit_locked(trade.seller_id, base, trade.amount)?;
        self.ledger.credit(trade.buyer_id, base, trade.amount);

        // Quote leg: buyer -> seller.
        self.ledger
            .debit_locked(trade.buyer_id, quote, trade.quote_amount)?;
        self.ledger.credit(trade.seller_id, quote, trade.quote_amount);

        self.consume_leg(&trade.sell_order_id, trade.amount)?;
        self.consume_leg(&trade.buy_order_id, trade.quote_amount)?;

        self.settled.mark(trade.id)?;
        debug!(
            trade_id = %trade.id,
            price = %trade.price,
            amount = %trade.amount,
            "trade settled"
        );
        Ok(())
    }

    /// Whether a trade has already been settled.
    #[must_use]
    pub fn is_settled(&self, trade_id: &peermatch_types::TradeId) -> bool {
        self.settled.is_settled(trade_id)
    }

    fn check_leg(&self, order_id: &OrderId, asset: &Asset, amount: Decimal) -> Result<()> {
        let reservation = self
            .reservations
            .get(order_id)
            .ok_or(EngineError::ReservationNotFound(*order_id))?;

        if reservation.state != peermatch_types::ReservationState::Active {
            return Err(EngineError::ReservationNotActive {
                id: reservation.id,
                state: reservation.state,
            });
        }
        if reservation.asset != *asset {
            return Err(EngineError::InvariantViolation {
                reason: format!(
                    "reservation for order {order_id} holds {} but settlement needs {asset}",
                    reservation.asset
                ),
            });
        }
        if amount > reservation.remaining {
            return Err(EngineError::InvariantViolation {
                reason: format!(
                    "settlement needs {amount} {asset} but reservation for order {order_id} holds {}",
                    reservation.remaining
                ),
            });
        }

        let locked = self.ledger.balance(reservation.user_id, asset).locked;
        if amount > locked {
            return Err(EngineError::InvariantViolation {
                reason: format!(
                    "settlement needs {amount} {asset} locked but user {} has {locked}",
                    reservation.user_id
                ),
            });
        }
        Ok(())
    }

    fn consume_leg(&mut self, order_id: &OrderId, amount: Decimal) -> Result<()> {
        let reservation = self
            .reservations
            .get_mut(order_id)
            .ok_or(EngineError::ReservationNotFound(*order_id))?;
        reservation.consume(amount)?;
        Ok(())
    }
}
