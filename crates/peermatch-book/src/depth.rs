//! Read-side aggregations over a live order book.
//!
//! Depth snapshots and price suggestions are advisory projections: they
//! are computed from the book inside the pair lane and published to
//! readers, so queries never contend with matching.

use chrono::{DateTime, Utc};
use peermatch_types::constants::PRICE_PRECISION;
use peermatch_types::{
    Confidence, DepthLevel, MarketDepth, OrderSide, PriceSuggestion, UserId,
};
use rust_decimal::Decimal;

use crate::orderbook::OrderBook;
use crate::price_level::PriceLevel;

/// Aggregate the top `max_levels` price levels per side into a
/// [`MarketDepth`] snapshot.
#[must_use]
pub fn depth_snapshot(book: &OrderBook, max_levels: usize, now: DateTime<Utc>) -> MarketDepth {
    MarketDepth {
        market: book.market.clone(),
        bids: aggregate(book.bid_levels(), max_levels),
        asks: aggregate(book.ask_levels(), max_levels),
        captured_at: now,
    }
}

fn aggregate<'a>(
    levels: impl Iterator<Item = &'a PriceLevel>,
    max_levels: usize,
) -> Vec<DepthLevel> {
    levels
        .take(max_levels)
        .map(|level| DepthLevel {
            price: level.price,
            amount: level.total_amount(),
            orders: level.len(),
        })
        .collect()
}

/// Suggest a competitive price for placing an order on `side`.
///
/// A buy is priced just under the best ask, a sell just over the best
/// bid, offset by `spread` (a fraction, e.g. `0.001` for 10 bps).
/// Confidence reflects how many resting orders back the reference
/// price: at least `high_threshold` opposing orders is HIGH, at least
/// `medium_threshold` is MEDIUM, anything else is LOW. An empty
/// opposing side yields no price at LOW confidence.
#[must_use]
pub fn suggest_price(
    depth: &MarketDepth,
    side: OrderSide,
    spread: Decimal,
    high_threshold: usize,
    medium_threshold: usize,
) -> PriceSuggestion {
    let (reference, opposing_orders) = match side {
        OrderSide::Buy => (depth.best_ask(), order_count(&depth.asks)),
        OrderSide::Sell => (depth.best_bid(), order_count(&depth.bids)),
    };

    let price = reference.map(|r| {
        let offset = match side {
            OrderSide::Buy => Decimal::ONE - spread,
            OrderSide::Sell => Decimal::ONE + spread,
        };
        (r * offset).round_dp(PRICE_PRECISION)
    });

    let confidence = if reference.is_none() {
        Confidence::Low
    } else if opposing_orders >= high_threshold {
        Confidence::High
    } else if opposing_orders >= medium_threshold {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    PriceSuggestion {
        side,
        price,
        reference,
        confidence,
    }
}

fn order_count(levels: &[DepthLevel]) -> usize {
    levels.iter().map(|l| l.orders).sum()
}

/// Walk the ask book from the best level and price a market buy of
/// `amount` base. Returns `(fillable, cost)`: how much of `amount` the
/// eligible resting asks cover, and the quote cost of that coverage.
///
/// Orders owned by `exclude_user` are skipped, matching the self-match
/// skip during matching, so the reservation sized from `cost` covers the
/// fills that will actually happen.
#[must_use]
pub fn market_buy_quote(
    book: &OrderBook,
    amount: Decimal,
    exclude_user: Option<UserId>,
) -> (Decimal, Decimal) {
    let mut outstanding = amount;
    let mut cost = Decimal::ZERO;

    'levels: for level in book.ask_levels() {
        for order in &level.orders {
            if outstanding <= Decimal::ZERO {
                break 'levels;
            }
            if exclude_user.is_some_and(|u| order.user_id == u) {
                continue;
            }
            let take = outstanding.min(order.remaining_amount);
            cost += take * level.price;
            outstanding -= take;
        }
    }

    (amount - outstanding, cost)
}

/// Total resting base amount on one book side, excluding `exclude_user`'s
/// own orders. Used to size market-order coverage checks.
#[must_use]
pub fn eligible_liquidity(
    book: &OrderBook,
    side: OrderSide,
    exclude_user: Option<UserId>,
) -> Decimal {
    let levels: Box<dyn Iterator<Item = &PriceLevel>> = match side {
        OrderSide::Buy => Box::new(book.bid_levels()),
        OrderSide::Sell => Box::new(book.ask_levels()),
    };
    levels
        .flat_map(|level| level.orders.iter())
        .filter(|o| !exclude_user.is_some_and(|u| o.user_id == u))
        .map(|o| o.remaining_amount)
        .sum()
}
