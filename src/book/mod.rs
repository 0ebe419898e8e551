// In-memory order book and order storage.

pub mod order_book;
pub mod storage;

pub use order_book::{Fill, OrderBook};
pub use storage::OrderStorage;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::common::IdT;

/// Books for every listed instrument, each behind its own mutex.
///
/// The dependency graph already serializes same-instrument order flow; the
/// per-book mutex covers the paths (cancels, timer expiry) whose read/write
/// sets carry only the order key.
pub struct BookSet {
    books: DashMap<IdT, Arc<Mutex<OrderBook>>>,
}

impl BookSet {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
        }
    }

    /// Lists an instrument, creating its (empty) book.
    pub fn add_instrument(&self, instrument: IdT) {
        self.books
            .entry(instrument)
            .or_insert_with(|| Arc::new(Mutex::new(OrderBook::new(instrument))));
    }

    pub fn contains(&self, instrument: IdT) -> bool {
        self.books.contains_key(&instrument)
    }

    pub fn book(&self, instrument: IdT) -> Option<Arc<Mutex<OrderBook>>> {
        self.books.get(&instrument).map(|entry| Arc::clone(&entry))
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl Default for BookSet {
    fn default() -> Self {
        Self::new()
    }
}
