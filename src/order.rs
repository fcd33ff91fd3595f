//! Order and cancel-request types flowing through the pipeline.

use serde::{Deserialize, Serialize};

/// Which side of the book an order or cancel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Buy,
    Sell,
}

/// Market orders take the best available counter-price; Limit orders carry
/// a price boundary and will not trade through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceType {
    Market,
    Limit,
}

/// A resting or incoming order.
///
/// `quantity` is mutated in place by the match engine as fills reduce the
/// remaining size; `confirmed_at` is stamped by the match engine when the
/// order is dequeued from `order_q`, not at intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub kind: OrderKind,
    pub price_type: PriceType,
    /// Ignored (treated as `0.0`) when `price_type` is `Market`.
    pub price: f64,
    pub quantity: u64,
    pub created_at: i64,
    pub confirmed_at: i64,
}

impl Order {
    /// `true` when there is no quantity left to fill or rest.
    pub fn is_exhausted(&self) -> bool {
        self.quantity == 0
    }
}

/// A request to pull a resting order out of its book.
///
/// `order_kind` is a hint telling the match engine which side to search; it
/// is looked up from the order store at intake, not guessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancel {
    pub order_id: String,
    pub order_kind: OrderKind,
    pub created_at: i64,
    pub confirmed_at: i64,
}

/// Emitted once a cancel request has been applied to a book (whether or not
/// the id was actually found there).
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct CancelConfirmation {
    pub order_id: String,
    pub created_at: i64,
    pub confirmed_at: i64,
}
