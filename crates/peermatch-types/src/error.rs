//! Error types for the PeerMatch engine.
//!
//! All errors use the `PM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Balance errors
//! - 3xx: Reservation errors
//! - 5xx: Matching errors
//! - 6xx: Settlement errors
//! - 9xx: General / internal errors
//!
//! Business errors (`InsufficientFunds`, `InvalidParameters`, `Forbidden`,
//! `OrderNotFound`) are returned synchronously to the caller.
//! `InvariantViolation` is a programmer error: it is logged, the offending
//! operation is aborted, and the affected pair lane halts (fail closed).

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{MarketPair, OrderId, ReservationId, ReservationState, TradeId};

/// Central error enum for all PeerMatch operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order is not resting in the book (unknown or terminal).
    #[error("PM_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The placement request failed validation before any reservation.
    #[error("PM_ERR_101: Invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    /// An order with this ID already exists in the book.
    #[error("PM_ERR_102: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The requesting user does not own the order.
    #[error("PM_ERR_103: Forbidden: order {order_id} is not owned by the requesting user")]
    Forbidden { order_id: OrderId },

    /// No lane is configured for this market pair.
    #[error("PM_ERR_104: Unknown market: {0}")]
    UnknownMarket(MarketPair),

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// Not enough available balance; the order is rejected before any
    /// book mutation.
    #[error("PM_ERR_200: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// A mutation would break `0 <= locked <= total` or fill accounting.
    /// Fatal — indicates a caller bug, never business-expected.
    #[error("PM_ERR_201: Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    // =================================================================
    // Reservation Errors (3xx)
    // =================================================================
    /// No reservation exists for this order.
    #[error("PM_ERR_300: No reservation for order {0}")]
    ReservationNotFound(OrderId),

    /// The reservation has already been released.
    #[error("PM_ERR_301: Reservation {id} is {state}, not ACTIVE")]
    ReservationNotActive {
        id: ReservationId,
        state: ReservationState,
    },

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// A market order cannot be fully covered by resting liquidity
    /// (under the reject-on-partial policy).
    #[error("PM_ERR_500: Insufficient resting liquidity for market order")]
    NoLiquidity,

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// A trade has already been settled (idempotency guard).
    #[error("PM_ERR_600: Trade already settled: {0}")]
    TradeAlreadySettled(TradeId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// The pair lane halted after a fatal invariant violation and needs
    /// operator intervention. Other pairs keep running.
    #[error("PM_ERR_900: Lane for {0} is halted after an invariant violation")]
    LaneHalted(MarketPair),

    /// The pair lane's task is gone (engine shutting down).
    #[error("PM_ERR_901: Lane closed")]
    LaneClosed,

    /// Configuration error (bad market definition, zero cache size, etc.).
    #[error("PM_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = EngineError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("PM_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = EngineError::InsufficientFunds {
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("PM_ERR_200"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn all_errors_have_pm_err_prefix() {
        let errors: Vec<EngineError> = vec![
            EngineError::InvalidParameters {
                reason: "test".into(),
            },
            EngineError::Forbidden {
                order_id: OrderId::new(),
            },
            EngineError::InvariantViolation {
                reason: "test".into(),
            },
            EngineError::TradeAlreadySettled(TradeId::new()),
            EngineError::NoLiquidity,
            EngineError::LaneHalted(MarketPair::new("BTC", "ZAR")),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("PM_ERR_"),
                "Error missing PM_ERR_ prefix: {msg}"
            );
        }
    }
}
