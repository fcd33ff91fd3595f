//! The match engine: single-threaded consumer of `order_q` that mutates the
//! two books and emits trades and cancel confirmations.

use tokio::sync::watch;
use tracing::{info, warn};

use crate::book::{BookSnapshot, BuyBook, SellBook};
use crate::message::{Message, MessageKind, Queue};
use crate::order::{Cancel, CancelConfirmation, Order, OrderKind, PriceType};
use crate::store::OrderStore;
use crate::trade::{RecentTrades, Trade};
use crate::utils::now_seconds;

/// Determines the trade price for a `buy`/`sell` pair, or `None` if the
/// pair is not compatible (matching should stop walking the book).
///
/// `aggressor_is_buy` picks the admissible extreme of the Limit×Limit case:
/// the incoming buy walks the sell book upward and pays the lowest
/// admissible (resting ask) price; the incoming sell walks the buy book
/// downward and receives the highest admissible (resting bid) price.
fn trade_price(buy: &Order, sell: &Order, aggressor_is_buy: bool, market_price: f64) -> Option<f64> {
    use PriceType::{Limit, Market};
    match (buy.price_type, sell.price_type) {
        (Market, Market) => (market_price > 0.0).then_some(market_price),
        (Market, Limit) => Some(sell.price),
        (Limit, Market) => Some(buy.price),
        (Limit, Limit) => {
            if buy.price < sell.price {
                None
            } else if aggressor_is_buy {
                Some(buy.price.min(sell.price))
            } else {
                Some(buy.price.max(sell.price))
            }
        }
    }
}

/// Single-threaded owner of both books and the last-trade reference price.
/// No lock is required on either field: nothing outside this struct ever
/// touches them.
pub struct MatchEngine {
    order_store: OrderStore,
    order_q: Queue,
    trade_q: Queue,
    cancel_q: Queue,
    buy_book: BuyBook,
    sell_book: SellBook,
    /// `0.0` means "undefined" — no trade has occurred yet.
    market_price: f64,
    book_feed: watch::Sender<BookSnapshot>,
    recent_trades: RecentTrades,
}

impl MatchEngine {
    pub fn new(
        order_store: OrderStore,
        order_q: Queue,
        trade_q: Queue,
        cancel_q: Queue,
        book_feed: watch::Sender<BookSnapshot>,
        recent_trades: RecentTrades,
    ) -> Self {
        MatchEngine {
            order_store,
            order_q,
            trade_q,
            cancel_q,
            buy_book: BuyBook::new(),
            sell_book: SellBook::new(),
            market_price: 0.0,
            book_feed,
            recent_trades,
        }
    }

    /// Drains `order_q` until the process-wide cancellation signal fires.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            let envelope = match self.order_q.pop().await {
                Ok(envelope) => envelope,
                Err(_) => return Ok(()),
            };

            match envelope.kind() {
                MessageKind::OrderCreate => {
                    let Ok(order) = envelope.decode::<Order>() else {
                        // Malformed payload: poison, not retryable. Ack and drop.
                        envelope.ack();
                        continue;
                    };
                    self.handle_order_create(order).await;
                    envelope.ack();
                }
                MessageKind::OrderCancel => {
                    let Ok(cancel) = envelope.decode::<Cancel>() else {
                        envelope.ack();
                        continue;
                    };
                    self.handle_order_cancel(cancel).await;
                    envelope.ack();
                }
                _ => {
                    // Unknown/mismatched kind: drop silently, still ack.
                    envelope.ack();
                }
            }

            self.publish_snapshot();
        }
    }

    /// Best-effort push of the current book state for `GET /book`. Ignored
    /// if nobody is listening (no HTTP surface attached, e.g. in tests).
    fn publish_snapshot(&self) {
        let _ = self.book_feed.send(BookSnapshot {
            bids: self.buy_book.to_levels(),
            asks: self.sell_book.to_levels(),
        });
    }

    async fn handle_order_create(&mut self, mut order: Order) {
        let confirmed_at = now_seconds();
        // Best-effort annotation: a missing store record just means the
        // order was already cancelled in-flight, which is benign.
        let _ = self.order_store.confirm_at(&order.id, confirmed_at).await;
        order.confirmed_at = confirmed_at;

        match order.kind {
            OrderKind::Buy => self.handle_buy_order(order).await,
            OrderKind::Sell => self.handle_sell_order(order).await,
        }
    }

    /// Incoming buy: walks the sell book from the lowest admissible ask
    /// upward, paying the resting ask on each fill.
    async fn handle_buy_order(&mut self, mut incoming: Order) {
        while incoming.quantity > 0 {
            let market_price = self.market_price;
            let Some(resting) = self.sell_book.peek_mut() else {
                break;
            };
            let Some(price) = trade_price(&incoming, resting, true, market_price) else {
                break;
            };

            let quantity = incoming.quantity.min(resting.quantity);
            let trade = Trade {
                buy_order_id: incoming.id.clone(),
                sell_order_id: resting.id.clone(),
                price,
                quantity,
                timestamp: now_seconds(),
            };

            incoming.quantity -= quantity;
            resting.quantity -= quantity;
            self.sell_book.pop_if_exhausted();
            self.market_price = trade.price;

            info!(?trade, "trade emitted");
            self.recent_trades.push(trade.clone());
            let _ = self
                .trade_q
                .push(Message::new(MessageKind::Trade, &trade))
                .await;
        }

        if incoming.quantity > 0 {
            self.buy_book.push(incoming);
        }
    }

    /// Incoming sell: walks the buy book from the highest admissible bid
    /// downward, receiving the resting bid on each fill.
    async fn handle_sell_order(&mut self, mut incoming: Order) {
        while incoming.quantity > 0 {
            let market_price = self.market_price;
            let Some(resting) = self.buy_book.peek_mut() else {
                break;
            };
            let Some(price) = trade_price(resting, &incoming, false, market_price) else {
                break;
            };

            let quantity = incoming.quantity.min(resting.quantity);
            let trade = Trade {
                buy_order_id: resting.id.clone(),
                sell_order_id: incoming.id.clone(),
                price,
                quantity,
                timestamp: now_seconds(),
            };

            incoming.quantity -= quantity;
            resting.quantity -= quantity;
            self.buy_book.pop_if_exhausted();
            self.market_price = trade.price;

            info!(?trade, "trade emitted");
            self.recent_trades.push(trade.clone());
            let _ = self
                .trade_q
                .push(Message::new(MessageKind::Trade, &trade))
                .await;
        }

        if incoming.quantity > 0 {
            self.sell_book.push(incoming);
        }
    }

    async fn handle_order_cancel(&mut self, mut cancel: Cancel) {
        match cancel.order_kind {
            OrderKind::Buy => {
                self.buy_book.cancel(&cancel.order_id);
            }
            OrderKind::Sell => {
                self.sell_book.cancel(&cancel.order_id);
            }
        }

        cancel.confirmed_at = now_seconds();
        let confirmation = CancelConfirmation {
            order_id: cancel.order_id,
            created_at: cancel.created_at,
            confirmed_at: cancel.confirmed_at,
        };
        warn!(order_id = %confirmation.order_id, "cancel confirmed");
        let _ = self
            .cancel_q
            .push(Message::new(MessageKind::Cancel, &confirmation))
            .await;
    }
}
