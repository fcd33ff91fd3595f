//! Priority order books: one balanced, ordered container per side with
//! O(log n) push, peek, pop, and cancel-by-id.
//!
//! Ordering is expressed as a key type per side (`BuyKey`, `SellKey`) with a
//! side-specific `Ord` impl, stored in a `BTreeMap` alongside a secondary
//! `id -> key` index — the "single owning container plus a secondary map"
//! shape described in the design notes. Both removal paths (`cancel`,
//! `pop`) keep the two indices in sync.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;

use crate::order::{Order, PriceType};

/// A price that is always compared with `total_cmp`; callers guarantee it is
/// never NaN (prices come from validated intake or are `0.0` for Market
/// orders).
#[derive(Debug, Clone, Copy, PartialEq)]
struct ComparablePrice(f64);

impl Eq for ComparablePrice {}

impl PartialOrd for ComparablePrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComparablePrice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// The data common to both sides' priority keys: price type, price, the
/// second-resolution confirmation time, and a monotonic tiebreaker.
///
/// `seq` is not named by the spec; it is the mechanism documented in
/// SPEC_FULL.md that guarantees FIFO ordering even when two orders are
/// confirmed within the same wall-clock second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyFields {
    price_type: PriceType,
    price: ComparablePrice,
    confirmed_at: i64,
    seq: u64,
}

impl KeyFields {
    fn of(order: &Order, seq: u64) -> Self {
        KeyFields {
            price_type: order.price_type,
            price: ComparablePrice(order.price),
            confirmed_at: order.confirmed_at,
            seq,
        }
    }

    /// `Less` means "sorts first" under the ordering rule common to both
    /// sides, except for the price comparison which the side supplies via
    /// `price_cmp`.
    fn cmp_with(&self, other: &Self, price_cmp: impl Fn(f64, f64) -> Ordering) -> Ordering {
        use PriceType::Market;
        match (self.price_type, other.price_type) {
            (Market, Market) => {}
            (Market, _) => return Ordering::Less,
            (_, Market) => return Ordering::Greater,
            _ => {}
        }
        price_cmp(self.price.0, other.price.0)
            .then_with(|| self.confirmed_at.cmp(&other.confirmed_at))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Buy-side key: higher price sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyKey(KeyFields);

impl PartialOrd for BuyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BuyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_with(&other.0, |a, b| b.total_cmp(&a))
    }
}

/// Sell-side key: lower price sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellKey(KeyFields);

impl PartialOrd for SellKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SellKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_with(&other.0, |a, b| a.total_cmp(&b))
    }
}

/// A side-specific priority key, constructible from an order and an
/// insertion sequence number.
pub trait PriorityKey: Ord + Copy {
    fn for_order(order: &Order, seq: u64) -> Self;
}

impl PriorityKey for BuyKey {
    fn for_order(order: &Order, seq: u64) -> Self {
        BuyKey(KeyFields::of(order, seq))
    }
}

impl PriorityKey for SellKey {
    fn for_order(order: &Order, seq: u64) -> Self {
        SellKey(KeyFields::of(order, seq))
    }
}

/// One side of the book: resting orders ordered by composite priority, with
/// an `id -> key` index for O(log n) cancel-by-id.
pub struct PriorityBook<K: PriorityKey> {
    tree: BTreeMap<K, Order>,
    index: HashMap<String, K>,
    next_seq: u64,
}

impl<K: PriorityKey> PriorityBook<K> {
    pub fn new() -> Self {
        PriorityBook {
            tree: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Inserts a resting order. The caller guarantees the id is not already
    /// present in this book (or the other side's book — the two books never
    /// share an id).
    pub fn push(&mut self, order: Order) {
        debug_assert!(order.quantity > 0, "resting orders must have quantity > 0");
        let key = K::for_order(&order, self.next_seq);
        self.next_seq += 1;
        self.index.insert(order.id.clone(), key);
        self.tree.insert(key, order);
    }

    /// Returns the highest-priority resting order without removing it.
    pub fn peek(&self) -> Option<&Order> {
        self.tree.iter().next().map(|(_, order)| order)
    }

    /// Returns a mutable reference to the highest-priority resting order's
    /// key, for callers that need to mutate quantity in place while the
    /// order is still resting at its current key (partial fills of a
    /// resting order do not change its priority).
    pub fn peek_mut(&mut self) -> Option<&mut Order> {
        self.tree.iter_mut().next().map(|(_, order)| order)
    }

    /// Removes and returns the highest-priority resting order.
    pub fn pop(&mut self) -> Option<Order> {
        let key = *self.tree.iter().next()?.0;
        let order = self.tree.remove(&key)?;
        self.index.remove(&order.id);
        Some(order)
    }

    /// Removes the entry for `order_id` if present, from both the tree and
    /// the id index. A silent no-op if the id is unknown — cancels for
    /// filled or already-absent orders must never fail the engine.
    pub fn cancel(&mut self, order_id: &str) -> bool {
        let Some(key) = self.index.remove(order_id) else {
            return false;
        };
        self.tree.remove(&key).is_some()
    }

    /// Drops the resting order at the front once it has been fully filled,
    /// keeping the tree and id index in sync without disturbing any other
    /// entry's priority.
    pub fn pop_if_exhausted(&mut self) {
        if matches!(self.peek(), Some(order) if order.is_exhausted()) {
            self.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Every resting order in priority order, best first. For snapshots and
    /// invariant checks only — not on the matching hot path.
    pub fn iter_in_priority_order(&self) -> impl Iterator<Item = &Order> {
        self.tree.values()
    }

    /// A read-only view of every resting order, best first, for the
    /// `GET /book` introspection endpoint.
    pub fn to_levels(&self) -> Vec<BookLevel> {
        self.iter_in_priority_order().map(BookLevel::from).collect()
    }
}

/// One resting order as surfaced by `GET /book`. Not used on the matching
/// hot path — built only when a snapshot is requested.
#[derive(Debug, Clone, Serialize)]
pub struct BookLevel {
    pub order_id: String,
    pub price_type: PriceType,
    pub price: f64,
    pub quantity: u64,
    pub confirmed_at: i64,
}

impl From<&Order> for BookLevel {
    fn from(order: &Order) -> Self {
        BookLevel {
            order_id: order.id.clone(),
            price_type: order.price_type,
            price: order.price,
            quantity: order.quantity,
            confirmed_at: order.confirmed_at,
        }
    }
}

/// A full two-sided snapshot of the book, best-priority first on each side.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl<K: PriorityKey> Default for PriorityBook<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub type BuyBook = PriorityBook<BuyKey>;
pub type SellBook = PriorityBook<SellKey>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderKind;

    fn limit(id: &str, kind: OrderKind, price: f64, qty: u64, confirmed_at: i64) -> Order {
        Order {
            id: id.to_string(),
            kind,
            price_type: PriceType::Limit,
            price,
            quantity: qty,
            created_at: confirmed_at,
            confirmed_at,
        }
    }

    fn market(id: &str, kind: OrderKind, qty: u64, confirmed_at: i64) -> Order {
        Order {
            id: id.to_string(),
            kind,
            price_type: PriceType::Market,
            price: 0.0,
            quantity: qty,
            created_at: confirmed_at,
            confirmed_at,
        }
    }

    #[test]
    fn buy_book_orders_higher_price_first() {
        let mut book = BuyBook::new();
        book.push(limit("a", OrderKind::Buy, 9.0, 10, 1));
        book.push(limit("b", OrderKind::Buy, 11.0, 10, 2));
        book.push(limit("c", OrderKind::Buy, 10.0, 10, 3));

        assert_eq!(book.pop().unwrap().id, "b");
        assert_eq!(book.pop().unwrap().id, "c");
        assert_eq!(book.pop().unwrap().id, "a");
    }

    #[test]
    fn sell_book_orders_lower_price_first() {
        let mut book = SellBook::new();
        book.push(limit("a", OrderKind::Sell, 9.0, 10, 1));
        book.push(limit("b", OrderKind::Sell, 11.0, 10, 2));
        book.push(limit("c", OrderKind::Sell, 10.0, 10, 3));

        assert_eq!(book.pop().unwrap().id, "a");
        assert_eq!(book.pop().unwrap().id, "c");
        assert_eq!(book.pop().unwrap().id, "b");
    }

    #[test]
    fn market_orders_sort_before_limit_regardless_of_price() {
        let mut book = BuyBook::new();
        book.push(limit("limit", OrderKind::Buy, 1_000.0, 10, 1));
        book.push(market("mkt", OrderKind::Buy, 10, 2));

        assert_eq!(book.pop().unwrap().id, "mkt");
        assert_eq!(book.pop().unwrap().id, "limit");
    }

    #[test]
    fn ties_on_price_break_fifo_by_confirmed_at() {
        let mut book = SellBook::new();
        book.push(limit("first", OrderKind::Sell, 10.0, 10, 5));
        book.push(limit("second", OrderKind::Sell, 10.0, 10, 5));

        assert_eq!(book.pop().unwrap().id, "first");
        assert_eq!(book.pop().unwrap().id, "second");
    }

    #[test]
    fn cancel_removes_from_tree_and_index() {
        let mut book = BuyBook::new();
        book.push(limit("a", OrderKind::Buy, 10.0, 10, 1));

        assert!(book.cancel("a"));
        assert!(book.is_empty());
        assert!(!book.cancel("a"));
    }

    #[test]
    fn cancel_of_unknown_id_is_a_silent_no_op() {
        let mut book = BuyBook::new();
        book.push(limit("a", OrderKind::Buy, 10.0, 10, 1));
        assert!(!book.cancel("does-not-exist"));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn peek_does_not_remove() {
        let mut book = BuyBook::new();
        book.push(limit("a", OrderKind::Buy, 10.0, 10, 1));
        assert_eq!(book.peek().unwrap().id, "a");
        assert_eq!(book.len(), 1);
    }
}
