//! Balance reservations backing open orders.
//!
//! A [`Reservation`] records the portion of a user's balance locked for one
//! order: the base asset for sells, the quote notional for buys. Fills
//! consume from `remaining`; whatever is left when the order reaches a
//! terminal state is unlocked exactly once.
//!
//! A buy filled below its limit price consumes less quote than was locked —
//! that price-improvement remainder stays in `remaining` until release.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Asset, EngineError, OrderId, ReservationId, Result, UserId};

/// What the Reservation Service must lock for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequirement {
    pub asset: Asset,
    pub amount: Decimal,
}

/// Lifecycle state of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationState {
    /// Locked and backing an open order.
    Active,
    /// Fully consumed by fills; nothing left to unlock.
    Consumed,
    /// Remainder unlocked on cancel/expire/fill. Terminal.
    Released,
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Consumed => write!(f, "CONSUMED"),
            Self::Released => write!(f, "RELEASED"),
        }
    }
}

/// The single active balance reservation owned by an open order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub order_id: OrderId,
    pub user_id: UserId,
    /// The locked asset: base for sells, quote for buys.
    pub asset: Asset,
    /// Originally locked amount.
    pub amount: Decimal,
    /// Locked amount not yet consumed by fills.
    pub remaining: Decimal,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    #[must_use]
    pub fn new(order_id: OrderId, user_id: UserId, asset: Asset, amount: Decimal) -> Self {
        Self {
            id: ReservationId::new(),
            order_id,
            user_id,
            asset,
            amount,
            remaining: amount,
            state: ReservationState::Active,
            created_at: Utc::now(),
        }
    }

    /// Consume part of the reservation for a settled fill.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] if the reservation is not
    /// active or cannot cover `amount` — reservation/ledger drift, fatal.
    pub fn consume(&mut self, amount: Decimal) -> Result<()> {
        if self.state != ReservationState::Active {
            return Err(EngineError::InvariantViolation {
                reason: format!("reservation {} is {}, cannot consume", self.id, self.state),
            });
        }
        if amount <= Decimal::ZERO || amount > self.remaining {
            return Err(EngineError::InvariantViolation {
                reason: format!(
                    "reservation {} cannot cover fill of {amount} (remaining {})",
                    self.id, self.remaining
                ),
            });
        }
        self.remaining -= amount;
        if self.remaining.is_zero() {
            self.state = ReservationState::Consumed;
        }
        Ok(())
    }

    /// Take the unconsumed remainder for unlocking, marking the reservation
    /// RELEASED. Returns the amount to unlock.
    ///
    /// # Errors
    /// Returns [`EngineError::ReservationNotActive`] if already released —
    /// release must happen exactly once.
    pub fn release(&mut self) -> Result<Decimal> {
        match self.state {
            ReservationState::Active => {
                let leftover = self.remaining;
                self.remaining = Decimal::ZERO;
                self.state = ReservationState::Released;
                Ok(leftover)
            }
            // Fully consumed by fills: nothing to unlock, and the terminal
            // transition still counts as the one release.
            ReservationState::Consumed => {
                self.state = ReservationState::Released;
                Ok(Decimal::ZERO)
            }
            ReservationState::Released => Err(EngineError::ReservationNotActive {
                id: self.id,
                state: self.state,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_reservation(amount: Decimal) -> Reservation {
        Reservation::new(OrderId::new(), UserId::new(), "ZAR".to_string(), amount)
    }

    #[test]
    fn consume_tracks_remaining() {
        let mut rsv = make_reservation(Decimal::new(100, 0));
        rsv.consume(Decimal::new(40, 0)).unwrap();
        assert_eq!(rsv.remaining, Decimal::new(60, 0));
        assert_eq!(rsv.state, ReservationState::Active);
    }

    #[test]
    fn full_consumption_marks_consumed() {
        let mut rsv = make_reservation(Decimal::new(100, 0));
        rsv.consume(Decimal::new(100, 0)).unwrap();
        assert_eq!(rsv.state, ReservationState::Consumed);
        assert_eq!(rsv.remaining, Decimal::ZERO);
    }

    #[test]
    fn over_consumption_is_invariant_violation() {
        let mut rsv = make_reservation(Decimal::new(100, 0));
        let err = rsv.consume(Decimal::new(101, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
        assert_eq!(rsv.remaining, Decimal::new(100, 0));
    }

    #[test]
    fn release_returns_remainder() {
        let mut rsv = make_reservation(Decimal::new(100, 0));
        rsv.consume(Decimal::new(30, 0)).unwrap();
        let leftover = rsv.release().unwrap();
        assert_eq!(leftover, Decimal::new(70, 0));
        assert_eq!(rsv.state, ReservationState::Released);
    }

    #[test]
    fn release_after_full_consumption_is_zero() {
        let mut rsv = make_reservation(Decimal::new(100, 0));
        rsv.consume(Decimal::new(100, 0)).unwrap();
        assert_eq!(rsv.release().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn double_release_rejected() {
        let mut rsv = make_reservation(Decimal::new(100, 0));
        rsv.release().unwrap();
        let err = rsv.release().unwrap_err();
        assert!(matches!(err, EngineError::ReservationNotActive { .. }));
    }

    #[test]
    fn consume_after_release_rejected() {
        let mut rsv = make_reservation(Decimal::new(100, 0));
        rsv.release().unwrap();
        assert!(rsv.consume(Decimal::ONE).is_err());
    }
}
