// Event processing: transaction construction and execution.

pub mod context;
pub mod processor;
pub mod stats;
pub mod transactions;

pub use context::ExecutionContext;
pub use processor::{EngineTransactionManager, Processor};
pub use stats::{ProcessorCounters, ProcessorStats};
pub use transactions::{
    CancelTransaction, ChangeStateTransaction, EngineTransaction, NewOrderTransaction,
    OrderTransaction, ProcessTransaction, ReplaceTransaction, TimerTransaction,
};
