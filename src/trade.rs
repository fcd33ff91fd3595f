//! The trade record produced when two orders match.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// An immutable record of a single match between a buy and a sell order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Trade {
    pub buy_order_id: String,
    pub sell_order_id: String,
    pub price: f64,
    pub quantity: u64,
    pub timestamp: i64,
}

const RECENT_TRADES_CAPACITY: usize = 1_000;

/// A bounded, shareable ring buffer of the most recent trades, for the
/// `GET /trades` introspection endpoint. Not the durable record of trades —
/// that is the `Recorder`'s job; this is just a cheap in-memory window.
#[derive(Clone, Default)]
pub struct RecentTrades(Arc<Mutex<VecDeque<Trade>>>);

impl RecentTrades {
    pub fn new() -> Self {
        RecentTrades(Arc::new(Mutex::new(VecDeque::with_capacity(
            RECENT_TRADES_CAPACITY,
        ))))
    }

    pub fn push(&self, trade: Trade) {
        let mut buf = self.0.lock().expect("recent trades lock poisoned");
        if buf.len() == RECENT_TRADES_CAPACITY {
            buf.pop_front();
        }
        buf.push_back(trade);
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Trade> {
        self.0.lock().expect("recent trades lock poisoned").iter().cloned().collect()
    }
}
