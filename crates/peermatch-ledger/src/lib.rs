//! # peermatch-ledger
//!
//! **Custody plane**: the ledger store and the balance reservation service
//! that bridges order lifecycle to ledger mutations.
//!
//! ## Architecture
//!
//! 1. **LedgerStore**: per-(user, asset) balances with total/locked
//!    accounting — the single source of truth for what a user may trade
//! 2. **SupplyAudit**: conservation invariant — Σ balances of an asset
//!    equals Σ deposits − Σ withdrawals, always
//! 3. **SettledTrades**: bounded idempotency guard preventing
//!    double-settlement of a fill
//! 4. **ReservationService**: locks funds at placement, consumes them at
//!    settlement, releases the remainder exactly once on cancel/expire/fill
//!
//! ## Money Flow
//!
//! ```text
//! place  → reserve_for_order() → LedgerStore.lock()
//! fill   → settle_fill()       → debit_locked() both legs + credit() both legs
//! cancel → release_remainder() → LedgerStore.unlock()
//! ```
//!
//! A balance is mutated only through this crate; two orders can never spend
//! the same funds.

pub mod idempotency;
pub mod reservation;
pub mod store;
pub mod supply;

pub use idempotency::SettledTrades;
pub use reservation::ReservationService;
pub use store::LedgerStore;
pub use supply::SupplyAudit;
