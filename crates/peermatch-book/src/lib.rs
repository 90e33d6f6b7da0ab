//! # peermatch-book
//!
//! **Price-time priority order book for PeerMatch.**
//!
//! One [`OrderBook`] per market pair. Only limit orders rest; market
//! orders are matched immediately by the engine and never enter the
//! book. The crate also provides the read-side aggregations built from
//! a book: depth snapshots, price suggestions, and market-buy cost
//! estimation.

pub mod depth;
pub mod orderbook;
pub mod price_level;

pub use depth::{depth_snapshot, eligible_liquidity, market_buy_quote, suggest_price};
pub use orderbook::OrderBook;
pub use price_level::PriceLevel;
