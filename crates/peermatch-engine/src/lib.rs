//! # peermatch-engine
//!
//! **Continuous double-auction matching engine for PeerMatch.**
//!
//! The engine runs one independent tokio task ("lane") per market pair.
//! All mutations of a market's book flow through its lane as commands,
//! so matching is serialized per market without locks around the book.
//! Custody lives in a shared [`ReservationService`]: every order locks
//! its funds before it can match, and every fill settles both legs
//! atomically before the orders are updated.
//!
//! - **Price-time priority**: better price first, earlier arrival first
//! - **Maker-price execution**: fills happen at the resting order's price
//! - **Fail closed**: an invariant violation halts the offending lane,
//!   other markets keep trading
//!
//! [`ReservationService`]: peermatch_ledger::ReservationService

pub mod engine;
pub mod lane;
pub mod matcher;
pub mod store;
pub mod supervisor;

pub use engine::MatchingEngine;
pub use lane::PairLane;
pub use matcher::{MatchAbort, MatchOutcome, match_order};
pub use store::{OrderStore, TradeLog};
