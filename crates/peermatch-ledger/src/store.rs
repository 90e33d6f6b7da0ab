//! The ledger store: per-(user, asset) balances with total/locked accounting.
//!
//! The single source of truth for what a user may trade. Every mutation is
//! a single-entry compare-and-check keyed by `(UserId, Asset)` — no
//! multi-user transaction exists at this layer; cross-user transfers are
//! composed from single-entry operations inside one Reservation Service
//! settlement.
//!
//! Failure semantics: `InsufficientFunds` is business-expected (the caller
//! asked for more than `available`); `InvariantViolation` means an unlock
//! or debit would drive `locked` negative — a caller bug, fatal, never
//! silently swallowed.

use std::collections::HashMap;

use peermatch_types::{Asset, Balance, EngineError, Result, UserId};
use rust_decimal::Decimal;

use crate::supply::SupplyAudit;

/// Durable balance records, one per (user, asset).
pub struct LedgerStore {
    balances: HashMap<(UserId, Asset), Balance>,
    supply: SupplyAudit,
}

impl LedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            supply: SupplyAudit::new(),
        }
    }

    // =================================================================
    // Deposits / withdrawals (custody boundary)
    // =================================================================

    /// Deposit funds: increases `total`, recorded in the supply audit.
    pub fn deposit(&mut self, user_id: UserId, asset: &str, amount: Decimal) {
        let entry = self
            .balances
            .entry((user_id, asset.to_string()))
            .or_default();
        entry.total += amount;
        self.supply.record_deposit(asset, amount);
    }

    /// Withdraw available funds.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if `amount > available`.
    pub fn withdraw(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        let entry = self.entry_mut(user_id, asset, amount)?;
        if entry.available() < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available: entry.available(),
            });
        }
        entry.total -= amount;
        self.supply.record_withdrawal(asset, amount);
        Ok(())
    }

    // =================================================================
    // Reservation-facing mutations
    // =================================================================

    /// Lock funds for an order (available → locked).
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if `amount > available`.
    pub fn lock(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        let entry = self.entry_mut(user_id, asset, amount)?;
        if entry.available() < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available: entry.available(),
            });
        }
        entry.locked += amount;
        Ok(())
    }

    /// Unlock funds (locked → available).
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] if `locked < amount` —
    /// a caller bug, never business-expected.
    pub fn unlock(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        let entry = self
            .balances
            .get_mut(&(user_id, asset.to_string()))
            .ok_or_else(|| locked_underflow(user_id, asset, amount, Decimal::ZERO))?;
        if entry.locked < amount {
            return Err(locked_underflow(user_id, asset, amount, entry.locked));
        }
        entry.locked -= amount;
        Ok(())
    }

    /// Spend locked funds during settlement: `total` and `locked` drop
    /// together, nothing returns to `available`.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] if `locked < amount`.
    pub fn debit_locked(&mut self, user_id: UserId, asset: &str, amount: Decimal) -> Result<()> {
        let entry = self
            .balances
            .get_mut(&(user_id, asset.to_string()))
            .ok_or_else(|| locked_underflow(user_id, asset, amount, Decimal::ZERO))?;
        if entry.locked < amount {
            return Err(locked_underflow(user_id, asset, amount, entry.locked));
        }
        entry.locked -= amount;
        entry.total -= amount;
        Ok(())
    }

    /// Credit the receiving side of a settlement leg.
    pub fn credit(&mut self, user_id: UserId, asset: &str, amount: Decimal) {
        let entry = self
            .balances
            .entry((user_id, asset.to_string()))
            .or_default();
        entry.total += amount;
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Balance for a (user, asset) pair; zero if no entry exists.
    #[must_use]
    pub fn balance(&self, user_id: UserId, asset: &str) -> Balance {
        self.balances
            .get(&(user_id, asset.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Total supply of an asset across all users.
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, entry)| entry.total)
            .sum()
    }

    /// Check the conservation invariant for one asset.
    pub fn verify_supply(&self, asset: &str) -> Result<()> {
        self.supply.verify(asset, self.total_supply(asset))
    }

    /// Check the conservation invariant for every tracked asset.
    pub fn verify_all_supplies(&self) -> Result<()> {
        for asset in self.supply.tracked_assets() {
            self.supply.verify(&asset, self.total_supply(&asset))?;
        }
        Ok(())
    }

    fn entry_mut(&mut self, user_id: UserId, asset: &str, needed: Decimal) -> Result<&mut Balance> {
        self.balances
            .get_mut(&(user_id, asset.to_string()))
            .ok_or(EngineError::InsufficientFunds {
                needed,
                available: Decimal::ZERO,
            })
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn locked_underflow(
    user_id: UserId,
    asset: &str,
    amount: Decimal,
    locked: Decimal,
) -> EngineError {
    EngineError::InvariantViolation {
        reason: format!(
            "locked balance underflow for user {user_id} asset {asset}: \
             need {amount}, locked {locked}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_increases_total() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "ZAR", Decimal::new(1000, 0));
        let bal = ledger.balance(user, "ZAR");
        assert_eq!(bal.total, Decimal::new(1000, 0));
        assert_eq!(bal.locked, Decimal::ZERO);
        assert_eq!(bal.available(), Decimal::new(1000, 0));
    }

    #[test]
    fn lock_moves_available_to_locked() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "ZAR", Decimal::new(1000, 0));
        ledger.lock(user, "ZAR", Decimal::new(400, 0)).unwrap();
        let bal = ledger.balance(user, "ZAR");
        assert_eq!(bal.total, Decimal::new(1000, 0));
        assert_eq!(bal.locked, Decimal::new(400, 0));
        assert_eq!(bal.available(), Decimal::new(600, 0));
    }

    #[test]
    fn lock_insufficient_fails_without_mutation() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "ZAR", Decimal::new(100, 0));
        let err = ledger.lock(user, "ZAR", Decimal::new(200, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(user, "ZAR").available(), Decimal::new(100, 0));
    }

    #[test]
    fn lock_respects_existing_locks() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "ZAR", Decimal::new(100, 0));
        ledger.lock(user, "ZAR", Decimal::new(80, 0)).unwrap();
        // Only 20 available now; the same funds cannot back two orders.
        let err = ledger.lock(user, "ZAR", Decimal::new(30, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    }

    #[test]
    fn unlock_restores_available() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "BTC", Decimal::new(2, 0));
        ledger.lock(user, "BTC", Decimal::ONE).unwrap();
        ledger.unlock(user, "BTC", Decimal::ONE).unwrap();
        let bal = ledger.balance(user, "BTC");
        assert_eq!(bal.available(), Decimal::new(2, 0));
        assert_eq!(bal.locked, Decimal::ZERO);
    }

    #[test]
    fn unlock_underflow_is_invariant_violation() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "BTC", Decimal::ONE);
        let err = ledger.unlock(user, "BTC", Decimal::ONE).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[test]
    fn debit_locked_spends_total_and_locked() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "ZAR", Decimal::new(1000, 0));
        ledger.lock(user, "ZAR", Decimal::new(500, 0)).unwrap();
        ledger
            .debit_locked(user, "ZAR", Decimal::new(500, 0))
            .unwrap();
        let bal = ledger.balance(user, "ZAR");
        assert_eq!(bal.total, Decimal::new(500, 0));
        assert_eq!(bal.locked, Decimal::ZERO);
        assert_eq!(bal.available(), Decimal::new(500, 0));
    }

    #[test]
    fn debit_unlocked_funds_is_invariant_violation() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "ZAR", Decimal::new(1000, 0));
        let err = ledger.debit_locked(user, "ZAR", Decimal::ONE).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[test]
    fn withdraw_only_available() {
        let mut ledger = LedgerStore::new();
        let user = UserId::new();
        ledger.deposit(user, "ZAR", Decimal::new(100, 0));
        ledger.lock(user, "ZAR", Decimal::new(80, 0)).unwrap();
        let err = ledger.withdraw(user, "ZAR", Decimal::new(50, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        ledger.withdraw(user, "ZAR", Decimal::new(20, 0)).unwrap();
        assert_eq!(ledger.balance(user, "ZAR").total, Decimal::new(80, 0));
    }

    #[test]
    fn supply_tracks_deposits_and_withdrawals() {
        let mut ledger = LedgerStore::new();
        let u1 = UserId::new();
        let u2 = UserId::new();
        ledger.deposit(u1, "ZAR", Decimal::new(1000, 0));
        ledger.deposit(u2, "ZAR", Decimal::new(500, 0));
        ledger.lock(u1, "ZAR", Decimal::new(300, 0)).unwrap();
        assert_eq!(ledger.total_supply("ZAR"), Decimal::new(1500, 0));
        ledger.verify_supply("ZAR").unwrap();

        ledger.withdraw(u2, "ZAR", Decimal::new(100, 0)).unwrap();
        assert_eq!(ledger.total_supply("ZAR"), Decimal::new(1400, 0));
        ledger.verify_all_supplies().unwrap();
    }

    #[test]
    fn nonexistent_balance_is_zero() {
        let ledger = LedgerStore::new();
        assert!(ledger.balance(UserId::new(), "BTC").is_zero());
    }
}
