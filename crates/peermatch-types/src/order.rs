//! Order types for the PeerMatch matching engine.
//!
//! Every open order owns exactly one active balance [`Reservation`];
//! the reservation is released exactly once, on the terminal transition.
//!
//! [`Reservation`]: crate::Reservation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EngineError, MarketPair, OrderId, ReservationRequirement, Result, UserId};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The opposing book side a taker on this side consumes.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// The type of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// Lifecycle status of an order.
///
/// `Filled`, `Cancelled`, and `Expired` are terminal. Status derives
/// deterministically from `remaining_amount` plus the terminal flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Expired)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Core order struct.
///
/// `filled_amount` is derived as `original_amount - remaining_amount`,
/// so the fill-accounting identity holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub market: MarketPair,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Fiat per unit of base asset. `None` for market orders.
    pub price: Option<Decimal>,
    pub original_amount: Decimal,
    pub remaining_amount: Decimal,
    /// Lane admission order, for time-priority tie-breaks and audit.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Portion of the original amount already executed.
    #[must_use]
    pub fn filled_amount(&self) -> Decimal {
        self.original_amount - self.remaining_amount
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.remaining_amount.is_zero()
    }

    /// Whether the order still sits in the book / can still fill.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Partial)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }

    /// Price compatibility against a resting (maker) order's price.
    ///
    /// Limit buys cross makers at or below their limit; limit sells cross
    /// makers at or above their limit. Market orders cross unconditionally.
    #[must_use]
    pub fn crosses(&self, maker_price: Decimal) -> bool {
        match (self.order_type, self.side) {
            (OrderType::Market, _) => true,
            (OrderType::Limit, OrderSide::Buy) => {
                self.price.is_some_and(|p| p >= maker_price)
            }
            (OrderType::Limit, OrderSide::Sell) => {
                self.price.is_some_and(|p| p <= maker_price)
            }
        }
    }

    /// What the Reservation Service must lock before this order is admitted.
    ///
    /// Returns `None` for market buys: their quote cost depends on the
    /// resting ask liquidity and is computed by the engine inside the
    /// pair lane.
    #[must_use]
    pub fn reservation_requirement(&self) -> Option<ReservationRequirement> {
        match (self.side, self.order_type) {
            (OrderSide::Sell, _) => Some(ReservationRequirement {
                asset: self.market.base.clone(),
                amount: self.original_amount,
            }),
            (OrderSide::Buy, OrderType::Limit) => {
                let price = self.price?;
                Some(ReservationRequirement {
                    asset: self.market.quote.clone(),
                    amount: price * self.original_amount,
                })
            }
            (OrderSide::Buy, OrderType::Market) => None,
        }
    }

    /// Apply an executed fill: decrement remaining, derive the new status.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] if `amount` is
    /// non-positive or exceeds the remaining quantity — a matcher bug,
    /// never business-expected.
    pub fn apply_fill(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO || amount > self.remaining_amount {
            return Err(EngineError::InvariantViolation {
                reason: format!(
                    "fill of {amount} invalid for order {} with remaining {}",
                    self.id, self.remaining_amount
                ),
            });
        }
        self.remaining_amount -= amount;
        self.status = if self.remaining_amount.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
        Ok(())
    }

    /// Transition to CANCELLED.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] if already terminal.
    pub fn cancel(&mut self) -> Result<()> {
        self.terminal_transition(OrderStatus::Cancelled)
    }

    /// Transition to EXPIRED.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] if already terminal.
    pub fn expire(&mut self) -> Result<()> {
        self.terminal_transition(OrderStatus::Expired)
    }

    fn terminal_transition(&mut self, to: OrderStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(EngineError::InvariantViolation {
                reason: format!(
                    "order {} is {} and cannot transition to {to}",
                    self.id, self.status
                ),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(side: OrderSide, price: Decimal, amount: Decimal) -> Self {
        Self::dummy_limit_for_user(UserId::new(), side, price, amount)
    }

    pub fn dummy_limit_for_user(
        user_id: UserId,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            market: MarketPair::new("BTC", "ZAR"),
            side,
            order_type: OrderType::Limit,
            status: OrderStatus::Pending,
            price: Some(price),
            original_amount: amount,
            remaining_amount: amount,
            sequence: 0,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn dummy_market(side: OrderSide, amount: Decimal) -> Self {
        Self {
            id: OrderId::new(),
            user_id: UserId::new(),
            market: MarketPair::new("BTC", "ZAR"),
            side,
            order_type: OrderType::Market,
            status: OrderStatus::Pending,
            price: None,
            original_amount: amount,
            remaining_amount: amount,
            sequence: 0,
            created_at: Utc::now(),
            expires_at: None,
        }
    }
}
