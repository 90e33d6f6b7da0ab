//! Outbound events for notification/analytics collaborators.
//!
//! Collaborators subscribe to a broadcast channel rather than injecting
//! callbacks into the engine. Event delivery is best-effort: a lagging
//! subscriber never blocks matching.

use serde::{Deserialize, Serialize};

use crate::{MarketPair, OrderId, OrderStatus, Trade, UserId};

/// Events emitted by the engine, one per fill and one per status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A fill was executed and settled.
    TradeExecuted(Trade),
    /// An order moved between lifecycle states.
    OrderStatusChanged {
        order_id: OrderId,
        user_id: UserId,
        market: MarketPair,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl EngineEvent {
    /// Convenience constructor for status transitions.
    #[must_use]
    pub fn status_changed(
        order_id: OrderId,
        user_id: UserId,
        market: MarketPair,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Self {
        Self::OrderStatusChanged {
            order_id,
            user_id,
            market,
            from,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_roundtrip() {
        let event = EngineEvent::status_changed(
            OrderId::new(),
            UserId::new(),
            MarketPair::new("BTC", "ZAR"),
            OrderStatus::Pending,
            OrderStatus::Filled,
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            EngineEvent::OrderStatusChanged {
                from: OrderStatus::Pending,
                to: OrderStatus::Filled,
                ..
            }
        ));
    }
}
