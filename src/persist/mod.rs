// Write-behind persistence: the asynchronous Postgres mirror.

pub mod postgres;
pub mod request;
pub mod sql;
pub mod store;
pub mod writer;

pub use postgres::PostgresBackend;
pub use request::{
    AccountWrite, ClearingWrite, InstrumentWrite, OrderWrite, RequestBuilder, WriteRequest,
};
pub use sql::SqlEnum;
pub use store::{MirrorBackend, MirrorConnection, StoreError};
pub use writer::{WriteBehind, WriteBehindConfig, WriteBehindCounters};
