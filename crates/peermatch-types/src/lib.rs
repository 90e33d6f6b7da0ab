//! # peermatch-types
//!
//! Shared types, errors, and configuration for the **PeerMatch** P2P
//! matching and custody engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`UserId`], [`TradeId`], [`ReservationId`], [`MarketPair`]
//! - **Order model**: [`Order`], [`OrderSide`], [`OrderType`], [`OrderStatus`]
//! - **Trade model**: [`Trade`]
//! - **Balance model**: [`Balance`], [`Asset`]
//! - **Reservation model**: [`Reservation`], [`ReservationState`], [`ReservationRequirement`]
//! - **Market depth projections**: [`MarketDepth`], [`DepthLevel`], [`PriceSuggestion`]
//! - **Outbound events**: [`EngineEvent`]
//! - **Configuration**: [`EngineConfig`], [`MarketConfig`]
//! - **Errors**: [`EngineError`] with `PM_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod config;
pub mod constants;
pub mod depth;
pub mod error;
pub mod event;
pub mod ids;
pub mod order;
pub mod reservation;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use peermatch_types::{Order, OrderSide, Trade, Balance, ...};

pub use balance::*;
pub use config::*;
pub use depth::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use order::*;
pub use reservation::*;
pub use trade::*;

// Constants are accessed via `peermatch_types::constants::FOO`
// (not re-exported to avoid name collisions).
