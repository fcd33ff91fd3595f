//! The in-memory, concurrency-safe `order_id -> Order` map.
//!
//! Written by the submission surface on intake, re-read and its
//! `confirmed_at` updated by the match engine, and read again by the cancel
//! intake path to look up which book to search. The only consistency
//! requirement: a successful `create` is visible to a subsequent `get` from
//! any thread — a plain mutex over a `HashMap` gives us that for free.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::errors::StoreError;
use crate::order::Order;

#[derive(Clone)]
pub struct OrderStore {
    pool: Arc<Mutex<HashMap<String, Order>>>,
}

impl OrderStore {
    pub fn new() -> Self {
        OrderStore {
            pool: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Inserts `order` under its own id, returning that id.
    pub async fn create(&self, order: Order) -> String {
        let id = order.id.clone();
        self.pool.lock().await.insert(id.clone(), order);
        id
    }

    /// Stamps `confirmed_at` on the stored record. Returns an error if the
    /// id is unknown; callers on the matching hot path ignore this error —
    /// a missing record just means the order was cancelled in-flight.
    pub async fn confirm_at(&self, order_id: &str, confirmed_at: i64) -> Result<(), StoreError> {
        let mut pool = self.pool.lock().await;
        let order = pool
            .get_mut(order_id)
            .ok_or_else(|| StoreError::UnknownOrder(order_id.to_string()))?;
        order.confirmed_at = confirmed_at;
        Ok(())
    }

    pub async fn get(&self, order_id: &str) -> Result<Order, StoreError> {
        self.pool
            .lock()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownOrder(order_id.to_string()))
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}
