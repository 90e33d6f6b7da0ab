//! Supply conservation invariant checker.
//!
//! Mathematical invariant enforced after settlement activity:
//! ```text
//! ∀ asset: Σ(total balances across users) == Σ(deposits) - Σ(withdrawals)
//! ```
//!
//! Matching and settlement only move value between users; they never mint
//! or burn it. If this invariant ever breaks, the affected lane halts with
//! a critical alert — it is the ultimate safety net.

use std::collections::HashMap;

use peermatch_types::{Asset, EngineError, Result};
use rust_decimal::Decimal;

/// Tracks per-asset supply totals and validates conservation.
pub struct SupplyAudit {
    /// Total deposits per asset since genesis.
    deposits: HashMap<Asset, Decimal>,
    /// Total withdrawals per asset since genesis.
    withdrawals: HashMap<Asset, Decimal>,
}

impl SupplyAudit {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deposits: HashMap::new(),
            withdrawals: HashMap::new(),
        }
    }

    /// Record a deposit.
    pub fn record_deposit(&mut self, asset: &str, amount: Decimal) {
        *self
            .deposits
            .entry(asset.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Record a withdrawal.
    pub fn record_withdrawal(&mut self, asset: &str, amount: Decimal) {
        *self
            .withdrawals
            .entry(asset.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Expected total supply for an asset: deposits - withdrawals.
    #[must_use]
    pub fn expected_supply(&self, asset: &str) -> Decimal {
        let deposited = self.deposits.get(asset).copied().unwrap_or(Decimal::ZERO);
        let withdrawn = self
            .withdrawals
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO);
        deposited - withdrawn
    }

    /// Verify that the actual supply (sum of all user balances) matches
    /// the expected supply for a given asset.
    ///
    /// # Errors
    /// Returns [`EngineError::InvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, asset: &str, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(EngineError::InvariantViolation {
                reason: format!(
                    "asset {asset}: actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.deposits.get(asset).copied().unwrap_or(Decimal::ZERO),
                    self.withdrawals
                        .get(asset)
                        .copied()
                        .unwrap_or(Decimal::ZERO),
                ),
            });
        }
        Ok(())
    }

    /// All assets with recorded activity.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<String> {
        let mut assets: std::collections::HashSet<String> = self.deposits.keys().cloned().collect();
        assets.extend(self.withdrawals.keys().cloned());
        assets.into_iter().collect()
    }
}

impl Default for SupplyAudit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_supply_is_zero() {
        let audit = SupplyAudit::new();
        assert_eq!(audit.expected_supply("BTC"), Decimal::ZERO);
        assert!(audit.verify("BTC", Decimal::ZERO).is_ok());
    }

    #[test]
    fn deposits_increase_expected() {
        let mut audit = SupplyAudit::new();
        audit.record_deposit("ZAR", Decimal::new(1000, 0));
        audit.record_deposit("ZAR", Decimal::new(500, 0));
        assert_eq!(audit.expected_supply("ZAR"), Decimal::new(1500, 0));
    }

    #[test]
    fn withdrawals_decrease_expected() {
        let mut audit = SupplyAudit::new();
        audit.record_deposit("ZAR", Decimal::new(1000, 0));
        audit.record_withdrawal("ZAR", Decimal::new(300, 0));
        assert_eq!(audit.expected_supply("ZAR"), Decimal::new(700, 0));
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut audit = SupplyAudit::new();
        audit.record_deposit("BTC", Decimal::new(10, 0));
        let err = audit.verify("BTC", Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[test]
    fn multiple_assets_independent() {
        let mut audit = SupplyAudit::new();
        audit.record_deposit("BTC", Decimal::new(5, 0));
        audit.record_deposit("ZAR", Decimal::new(50_000, 0));
        assert!(audit.verify("BTC", Decimal::new(5, 0)).is_ok());
        assert!(audit.verify("ZAR", Decimal::new(50_000, 0)).is_ok());
        assert_eq!(audit.tracked_assets().len(), 2);
    }
}
