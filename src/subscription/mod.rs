// Subscription matching: filter AST, indexed store, broadcast layer.

pub mod dispatch;
pub mod filter;
pub mod layer;
pub mod manager;

pub use dispatch::EventDispatcher;
pub use filter::{
    AccountFilter, ClearingFilter, DatePredicate, EnumPredicate, IdPredicate, InstrumentFilter,
    NumPredicate, OrderFilter, OrderPredicate, StringPredicate,
};
pub use layer::SubscriptionLayer;
pub use manager::{SubscriptionEntry, SubscriptionKind, SubscriptionManager};
