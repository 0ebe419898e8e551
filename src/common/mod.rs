// Shared types used across all engine modules.

pub mod id;

pub use id::{IdGenerator, IdT, SourceId, SubscriberId, TransactionId};

/// Price of an order or execution.
pub type Price = f64;

/// Share quantity.
pub type Quantity = u32;

/// Seconds-resolution timestamp or `yyyymmdd` date, context dependent.
pub type DateTime = u64;

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> DateTime {
    chrono::Utc::now().timestamp().max(0) as DateTime
}
