// Durable record log: per-entity codecs, the dispatcher and the log file.

pub mod codec;
pub mod log;
pub mod record;

pub use codec::{
    AccountCodec, ClearingCodec, InstrumentCodec, OrderCodec, RawDataCodec, StringCodec,
};
pub use log::{LoadStats, RecordLog};
pub use record::{NullRecordSink, RecordDispatcher, RecordSink, RecordType, CODEC_VERSION};
