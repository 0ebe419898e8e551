// Data model: entities, order enums and the shared wide-data store.

pub mod entities;
pub mod enums;
pub mod order;
pub mod wide;

pub use entities::{
    AccountEntry, ClearingEntry, ExecutionEntry, ExecutionList, ExecutionRef, InstrumentEntry,
    RawDataEntry,
};
pub use enums::{
    AccountType, Capacity, Currency, ExecType, OrderStatus, OrderType, RawDataType, SettlType,
    Side, TimeInForce,
};
pub use order::{OrderEntry, ReplaceParams};
pub use wide::{LazyRef, WideDataStorage, WideValue};
