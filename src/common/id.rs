// Composite identifiers used as primary keys throughout the engine.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Composite identifier: a sequence number plus a session date (`yyyymmdd`).
///
/// An `IdT` is valid only when both halves are non-zero. The total order is
/// lexicographic on `(id, date)`, which the derived `Ord` provides because of
/// the field declaration order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IdT {
    pub id: u64,
    pub date: u32,
}

impl IdT {
    pub const fn new(id: u64, date: u32) -> Self {
        Self { id, date }
    }

    /// Both halves must be non-zero for the identifier to address anything.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.id != 0 && self.date != 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.id = 0;
        self.date = 0;
    }
}

impl fmt::Display for IdT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.date)
    }
}

/// Identifier assigned to a transaction on insertion into the manager.
pub type TransactionId = IdT;

/// Identifier of a wide-data value (instrument, account, string, ...).
pub type SourceId = IdT;

/// Identifier of a subscription handler.
pub type SubscriberId = IdT;

/// Monotonic identifier source for one engine session.
///
/// Every identifier produced by one generator carries the same session date;
/// the sequence half is a strictly increasing counter, so ids are totally
/// ordered in generation order. Shared by reference between all producers.
pub struct IdGenerator {
    counter: AtomicU64,
    date: u32,
}

impl IdGenerator {
    pub fn new(date: u32) -> Self {
        debug_assert!(date != 0, "session date must be non-zero");
        Self {
            counter: AtomicU64::new(0),
            date,
        }
    }

    /// Returns the next identifier. Never returns an invalid id.
    pub fn next_id(&self) -> IdT {
        IdT {
            id: self.counter.fetch_add(1, Ordering::Relaxed) + 1,
            date: self.date,
        }
    }

    /// Moves the sequence past `floor` so replayed identifiers are never
    /// re-issued. Called once after log recovery, before any producer runs.
    pub fn advance_past(&self, floor: u64) {
        self.counter.fetch_max(floor, Ordering::Relaxed);
    }

    pub fn session_date(&self) -> u32 {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(!IdT::default().is_valid());
        assert!(!IdT::new(1, 0).is_valid());
        assert!(!IdT::new(0, 20260801).is_valid());
        assert!(IdT::new(1, 20260801).is_valid());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(IdT::new(1, 9) < IdT::new(2, 1));
        assert!(IdT::new(3, 1) < IdT::new(3, 2));
        assert_eq!(IdT::new(7, 7), IdT::new(7, 7));
    }

    #[test]
    fn test_advance_past_skips_replayed_ids() {
        let generator = IdGenerator::new(20260801);
        generator.advance_past(40);
        assert_eq!(generator.next_id(), IdT::new(41, 20260801));
        // Advancing backwards never rewinds the sequence.
        generator.advance_past(5);
        assert_eq!(generator.next_id(), IdT::new(42, 20260801));
    }

    #[test]
    fn test_generator_is_monotonic() {
        let generator = IdGenerator::new(20260801);
        let mut last = IdT::default();
        for _ in 0..100 {
            let next = generator.next_id();
            assert!(next.is_valid());
            assert!(last < next);
            last = next;
        }
    }
}
