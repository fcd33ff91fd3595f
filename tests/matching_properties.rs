//! Property test: random interleaved streams of creates and cancels, checked
//! for quantity conservation and priority-ordering invariants after the
//! stream settles.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use order_book_engine::book::{BookLevel, BookSnapshot};
use order_book_engine::matching::MatchEngine;
use order_book_engine::message::{Message, MessageKind, Queue};
use order_book_engine::order::{Cancel, Order, OrderKind, PriceType};
use order_book_engine::store::OrderStore;
use order_book_engine::trade::{RecentTrades, Trade};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Action {
    Create {
        kind: OrderKind,
        price_type: PriceType,
        price_tick: u8,
        quantity: u64,
    },
    CancelPrior {
        offset: usize,
    },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (any::<bool>(), any::<bool>(), 1u8..=5, 1u64..=20).prop_map(
            |(is_buy, is_market, price_tick, quantity)| Action::Create {
                kind: if is_buy { OrderKind::Buy } else { OrderKind::Sell },
                price_type: if is_market { PriceType::Market } else { PriceType::Limit },
                price_tick,
                quantity,
            }
        ),
        1 => (0usize..50).prop_map(|offset| Action::CancelPrior { offset }),
    ]
}

async fn run_stream(actions: Vec<Action>) -> (HashMap<String, u64>, HashSet<String>, Vec<Trade>, BookSnapshot) {
    let token = CancellationToken::new();
    let order_store = OrderStore::new();
    let order_q = Queue::new(256, token.clone());
    let trade_q = Queue::new(256, token.clone());
    let cancel_q = Queue::new(256, token.clone());
    let (book_tx, book_rx) = tokio::sync::watch::channel(BookSnapshot::default());
    let recent_trades = RecentTrades::new();

    let engine = MatchEngine::new(
        order_store.clone(),
        order_q.clone(),
        trade_q.clone(),
        cancel_q.clone(),
        book_tx,
        recent_trades,
    );
    tokio::spawn(engine.run());

    let trades = Arc::new(Mutex::new(Vec::new()));
    let trades_sink = trades.clone();
    tokio::spawn(async move {
        while let Ok(envelope) = trade_q.pop().await {
            if let Ok(trade) = envelope.decode::<Trade>() {
                trades_sink.lock().unwrap().push(trade);
            }
            envelope.ack();
        }
    });
    tokio::spawn(async move {
        while let Ok(envelope) = cancel_q.pop().await {
            envelope.ack();
        }
    });

    let mut initial = HashMap::new();
    let mut created_ids = Vec::new();
    let mut cancelled = HashSet::new();

    for (i, action) in actions.into_iter().enumerate() {
        match action {
            Action::Create {
                kind,
                price_type,
                price_tick,
                quantity,
            } => {
                let id = format!("o{i}");
                let order = Order {
                    id: id.clone(),
                    kind,
                    price_type,
                    price: if price_type == PriceType::Limit { price_tick as f64 } else { 0.0 },
                    quantity,
                    created_at: 0,
                    confirmed_at: 0,
                };
                order_store.create(order.clone()).await;
                order_q
                    .push(Message::new(MessageKind::OrderCreate, &order))
                    .await
                    .unwrap();
                initial.insert(id.clone(), quantity);
                created_ids.push(id);
            }
            Action::CancelPrior { offset } => {
                if created_ids.is_empty() {
                    continue;
                }
                let idx = offset % created_ids.len();
                let target = &created_ids[idx];
                if let Ok(order) = order_store.get(target).await {
                    order_q
                        .push(Message::new(
                            MessageKind::OrderCancel,
                            &Cancel {
                                order_id: target.clone(),
                                order_kind: order.kind,
                                created_at: 0,
                                confirmed_at: 0,
                            },
                        ))
                        .await
                        .unwrap();
                    cancelled.insert(target.clone());
                }
            }
        }
    }

    tokio::time::sleep(Duration::from_millis(80)).await;
    // No actions may have reached order_q at all (e.g. a lone cancel with
    // nothing yet created), in which case the engine never publishes and the
    // default empty snapshot is the correct read — don't block on a change
    // that may never come.
    let snapshot = book_rx.borrow().clone();
    let observed_trades = trades.lock().unwrap().clone();

    (initial, cancelled, observed_trades, snapshot)
}

fn assert_sorted_non_increasing_priority(levels: &[BookLevel], buy_side: bool) {
    for pair in levels.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let a_is_market = a.price_type == PriceType::Market;
        let b_is_market = b.price_type == PriceType::Market;
        if a_is_market && !b_is_market {
            continue;
        }
        if !a_is_market && b_is_market {
            panic!("a limit order sorted ahead of a market order");
        }
        if a_is_market && b_is_market {
            continue;
        }
        if buy_side {
            assert!(a.price >= b.price, "buy book must be highest-price-first");
        } else {
            assert!(a.price <= b.price, "sell book must be lowest-price-first");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn quantity_is_conserved_and_books_stay_priority_ordered(
        actions in proptest::collection::vec(action_strategy(), 1..30)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (initial, cancelled, trades, snapshot) = runtime.block_on(run_stream(actions));

        let mut filled: HashMap<String, u64> = HashMap::new();
        for trade in &trades {
            *filled.entry(trade.buy_order_id.clone()).or_insert(0) += trade.quantity;
            *filled.entry(trade.sell_order_id.clone()).or_insert(0) += trade.quantity;
        }

        let mut resting: HashMap<String, u64> = HashMap::new();
        for level in snapshot.bids.iter().chain(snapshot.asks.iter()) {
            resting.insert(level.order_id.clone(), level.quantity);
            prop_assert!(
                !cancelled.contains(&level.order_id),
                "a cancelled order must not still be resting"
            );
        }

        for (id, qty) in &initial {
            let filled_qty = filled.get(id).copied().unwrap_or(0);
            prop_assert!(filled_qty <= *qty, "an order must never be overfilled");

            if !cancelled.contains(id) {
                let resting_qty = resting.get(id).copied().unwrap_or(0);
                prop_assert_eq!(
                    filled_qty + resting_qty,
                    *qty,
                    "uncancelled order quantity must be fully accounted for"
                );
            }
        }

        assert_sorted_non_increasing_priority(&snapshot.bids, true);
        assert_sorted_non_increasing_priority(&snapshot.asks, false);
    }
}
