//! Continuous price-time priority matching.
//!
//! An incoming (taker) order matches against the best resting (maker)
//! orders on the opposing side, best price first, FIFO within a level.
//! Every fill executes at the **maker's** price and is settled through
//! the reservation service before either order is mutated, so a
//! settlement failure aborts the fill with the book, orders, and
//! balances unchanged.
//!
//! ## Self-Match Skip
//!
//! When one user ends up on both sides, the maker is skipped and put
//! back at the front of its level afterwards. Matching continues with
//! the next maker, so a user's own resting orders never block the rest
//! of the book.

use chrono::Utc;
use peermatch_types::{EngineError, EngineEvent, Order, Trade, TradeId};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use peermatch_book::OrderBook;
use peermatch_ledger::ReservationService;

/// What a matching pass produced.
#[derive(Debug)]
pub struct MatchOutcome {
    /// The taker order with fills applied.
    pub taker: Order,
    /// Trades executed and settled, in execution order.
    pub trades: Vec<Trade>,
    /// Latest state of every maker that was filled against.
    pub maker_updates: Vec<Order>,
    /// Events to broadcast, in emission order.
    pub events: Vec<EngineEvent>,
}

/// A matching pass cut short by a settlement or accounting failure.
///
/// Fills settled before the failure have already moved money; the
/// outcome carries their trade records so the caller can persist and
/// broadcast them before halting. The failing fill itself is rolled
/// back (maker reinstated, neither order mutated).
#[derive(Debug)]
pub struct MatchAbort {
    pub error: EngineError,
    pub outcome: MatchOutcome,
}

/// Match a taker order against the book until its price no longer
/// crosses, its amount is exhausted, or the opposing side runs dry.
///
/// The taker must already hold a reservation covering its fills; resting
/// makers hold theirs from admission. The caller decides what happens to
/// any unmatched remainder.
///
/// # Errors
/// Settlement and fill-accounting failures abort the pass with a
/// [`MatchAbort`] carrying both the error and the partial outcome; the
/// caller is expected to persist the outcome's trades and halt the lane.
pub fn match_order(
    book: &mut OrderBook,
    reservations: &mut ReservationService,
    mut taker: Order,
    allow_self_match: bool,
) -> Result<MatchOutcome, Box<MatchAbort>> {
    let opposing = taker.side.opposite();
    let mut trades = Vec::new();
    let mut maker_updates = Vec::new();
    let mut events = Vec::new();
    let mut abort: Option<EngineError> = None;
    // Own-side makers skipped for self-match, restored after the pass.
    let mut skipped: Vec<Order> = Vec::new();

    while taker.remaining_amount > Decimal::ZERO {
        let Some(mut maker) = book.pop_best(opposing) else {
            break;
        };
        let Some(maker_price) = maker.price else {
            abort = Some(EngineError::InvariantViolation {
                reason: format!("resting order {} has no price", maker.id),
            });
            reinstate(book, maker);
            break;
        };

        if !taker.crosses(maker_price) {
            reinstate(book, maker);
            break;
        }

        if !allow_self_match && maker.user_id == taker.user_id {
            debug!(
                user = %taker.user_id,
                taker_order = %taker.id,
                maker_order = %maker.id,
                "self-match skipped"
            );
            skipped.push(maker);
            continue;
        }

        let fill = taker.remaining_amount.min(maker.remaining_amount);
        let trade = build_trade(&taker, &maker, maker_price, fill);

        if let Err(err) = reservations.settle_fill(&trade) {
            warn!(
                trade_id = %trade.id,
                error = %err,
                "settlement failed, fill aborted"
            );
            reinstate(book, maker);
            abort = Some(err);
            break;
        }

        // Money has moved; the trade record must survive whatever
        // happens to the rest of the pass.
        debug!(
            trade_id = %trade.id,
            price = %trade.price,
            amount = %trade.amount,
            buyer = %trade.buyer_id,
            seller = %trade.seller_id,
            "trade executed"
        );
        events.push(EngineEvent::TradeExecuted(trade.clone()));
        trades.push(trade);

        let taker_from = taker.status;
        let maker_from = maker.status;
        if let Err(err) = taker
            .apply_fill(fill)
            .and_then(|()| maker.apply_fill(fill))
        {
            maker_updates.push(maker);
            abort = Some(err);
            break;
        }

        events.push(EngineEvent::status_changed(
            maker.id,
            maker.user_id,
            maker.market.clone(),
            maker_from,
            maker.status,
        ));
        if taker.status != taker_from {
            events.push(EngineEvent::status_changed(
                taker.id,
                taker.user_id,
                taker.market.clone(),
                taker_from,
                taker.status,
            ));
        }

        if maker.is_filled() {
            // Close out the maker's reservation. For a buy maker filled
            // at its own price this unlocks exactly zero.
            if let Err(err) = reservations.release_remainder(&maker.id) {
                maker_updates.push(maker);
                abort = Some(err);
                break;
            }
        } else {
            reinstate(book, maker.clone());
        }
        maker_updates.push(maker);
    }

    restore_skipped(book, &mut skipped);

    let outcome = MatchOutcome {
        taker,
        trades,
        maker_updates,
        events,
    };
    match abort {
        None => Ok(outcome),
        Some(error) => Err(Box::new(MatchAbort { error, outcome })),
    }
}

/// Put a popped maker back at the front of its level. Cannot fail for an
/// order that just came out of the book; a failure here is logged and
/// swallowed because the callers are already on an abort path.
fn reinstate(book: &mut OrderBook, order: Order) {
    let id = order.id;
    if let Err(err) = book.reinsert_front(order) {
        warn!(order_id = %id, error = %err, "failed to reinstate resting order");
    }
}

/// Put skipped makers back in reverse pop order, restoring their
/// original time priority.
fn restore_skipped(book: &mut OrderBook, skipped: &mut Vec<Order>) {
    for order in skipped.drain(..).rev() {
        reinstate(book, order);
    }
}

fn build_trade(taker: &Order, maker: &Order, price: Decimal, amount: Decimal) -> Trade {
    let (buy, sell) = match taker.side {
        peermatch_types::OrderSide::Buy => (taker, maker),
        peermatch_types::OrderSide::Sell => (maker, taker),
    };
    Trade {
        id: TradeId::new(),
        market: taker.market.clone(),
        buy_order_id: buy.id,
        sell_order_id: sell.id,
        buyer_id: buy.user_id,
        seller_id: sell.user_id,
        price,
        amount,
        quote_amount: price * amount,
        executed_at: Utc::now(),
    }
}
