//! Settlement idempotency guard — prevents double-settlement.
//!
//! Each trade can be settled exactly once. A retried settlement of the
//! same `TradeId` returns [`EngineError::TradeAlreadySettled`] and mutates
//! nothing, so balances end up the same as after a single settlement.
//!
//! The guard maintains a bounded set with FIFO eviction so memory usage
//! stays predictable in long-running engines.

use std::collections::{HashSet, VecDeque};

use peermatch_types::{EngineError, Result, TradeId};

/// Bounded set of already-settled trade IDs.
pub struct SettledTrades {
    settled: HashSet<TradeId>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<TradeId>,
    max_size: usize,
}

impl SettledTrades {
    /// Create a new guard with the given maximum cache size.
    ///
    /// # Panics
    /// Panics if `max_size` is zero.
    pub fn new(max_size: usize) -> Self {
        assert!(max_size > 0, "SettledTrades max_size must be > 0");
        Self {
            settled: HashSet::with_capacity(max_size.min(4096)),
            order: VecDeque::with_capacity(max_size.min(4096)),
            max_size,
        }
    }

    /// Mark a trade as settled.
    ///
    /// # Errors
    /// Returns [`EngineError::TradeAlreadySettled`] if `trade_id` was
    /// already marked.
    pub fn mark(&mut self, trade_id: TradeId) -> Result<()> {
        if self.settled.contains(&trade_id) {
            return Err(EngineError::TradeAlreadySettled(trade_id));
        }

        if self.settled.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.settled.remove(&oldest);
            }
        }

        self.settled.insert(trade_id);
        self.order.push_back(trade_id);
        Ok(())
    }

    /// Whether a trade has already been settled.
    #[must_use]
    pub fn is_settled(&self, trade_id: &TradeId) -> bool {
        self.settled.contains(trade_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.settled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_mark_ok() {
        let mut guard = SettledTrades::new(100);
        let trade_id = TradeId::new();
        assert!(guard.mark(trade_id).is_ok());
        assert!(guard.is_settled(&trade_id));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn double_mark_blocked() {
        let mut guard = SettledTrades::new(100);
        let trade_id = TradeId::new();
        guard.mark(trade_id).unwrap();

        let err = guard.mark(trade_id).unwrap_err();
        assert!(
            matches!(err, EngineError::TradeAlreadySettled(id) if id == trade_id),
            "Expected TradeAlreadySettled, got: {err:?}"
        );
    }

    #[test]
    fn evicts_oldest() {
        let mut guard = SettledTrades::new(3);
        let ids: Vec<TradeId> = (0..4).map(|_| TradeId::new()).collect();

        for id in &ids[..3] {
            guard.mark(*id).unwrap();
        }
        assert_eq!(guard.len(), 3);

        guard.mark(ids[3]).unwrap();
        assert_eq!(guard.len(), 3);
        assert!(!guard.is_settled(&ids[0]), "oldest should be evicted");
        assert!(guard.is_settled(&ids[1]));
        assert!(guard.is_settled(&ids[3]));
    }

    #[test]
    fn empty_guard() {
        let guard = SettledTrades::new(10);
        assert!(guard.is_empty());
        assert!(!guard.is_settled(&TradeId::new()));
    }

    #[test]
    #[should_panic(expected = "max_size must be > 0")]
    fn zero_max_size_panics() {
        let _ = SettledTrades::new(0);
    }
}
