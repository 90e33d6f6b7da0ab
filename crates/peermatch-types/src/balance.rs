//! Balance tracking types for the PeerMatch custody model.
//!
//! Every (user, asset) pair has a `total` balance and a `locked` portion
//! earmarked for open orders. The invariant `0 <= locked <= total` holds
//! at all times; `available = total - locked`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single balance entry for a (user, asset) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    /// Full balance owned by the user, including the locked portion.
    pub total: Decimal,
    /// Portion reserved for open orders, unavailable for new orders.
    pub locked: Decimal,
}

impl Balance {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }

    /// Balance usable for new orders or withdrawal.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.total - self.locked
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.total.is_zero() && self.locked.is_zero()
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for asset identifiers (e.g., "BTC", "ETH", "ZAR").
pub type Asset = String;
