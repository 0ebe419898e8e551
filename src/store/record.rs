// Record dispatcher: routes entities to the durable log and back.

use std::sync::Arc;

use bytes::{Buf, BufMut};
use tracing::warn;

use crate::book::{BookSet, OrderStorage};
use crate::common::IdT;
use crate::error::{EngineError, Result};
use crate::model::{
    AccountEntry, ClearingEntry, InstrumentEntry, OrderEntry, RawDataEntry, WideDataStorage,
};

use super::codec::{AccountCodec, ClearingCodec, InstrumentCodec, OrderCodec, RawDataCodec, StringCodec};

/// Discriminant of a durable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RecordType {
    Instrument = 1,
    String = 2,
    Account = 3,
    Clearing = 4,
    RawData = 5,
    Execution = 6,
    ExecutionList = 7,
    Order = 8,
}

impl RecordType {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => RecordType::Instrument,
            2 => RecordType::String,
            3 => RecordType::Account,
            4 => RecordType::Clearing,
            5 => RecordType::RawData,
            6 => RecordType::Execution,
            7 => RecordType::ExecutionList,
            8 => RecordType::Order,
            _ => return None,
        })
    }
}

/// Codec version stamped into every record.
pub const CODEC_VERSION: u32 = 0;

/// Destination of encoded records (the append-only log, or a null sink when
/// durability is disabled). Must not fail: persistence problems are logged,
/// never propagated into an executing transaction.
pub trait RecordSink: Send + Sync {
    fn save(&self, id: IdT, record: &[u8]);
}

/// Sink that drops every record; used when the record log is disabled.
pub struct NullRecordSink;

impl RecordSink for NullRecordSink {
    fn save(&self, _id: IdT, _record: &[u8]) {}
}

/// Encodes entities into `[record_type][version][payload]` records for the
/// sink, and decodes loaded records back into their restore targets: orders
/// into the book and order storage, everything else into the wide store.
pub struct RecordDispatcher {
    wide: Arc<WideDataStorage>,
    books: Arc<BookSet>,
    orders: Arc<OrderStorage>,
    sink: Arc<dyn RecordSink>,
}

impl RecordDispatcher {
    pub fn new(
        wide: Arc<WideDataStorage>,
        books: Arc<BookSet>,
        orders: Arc<OrderStorage>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            wide,
            books,
            orders,
            sink,
        }
    }

    fn header(record_type: RecordType) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.put_u32_ne(record_type as u32);
        buf.put_u32_ne(CODEC_VERSION);
        buf
    }

    pub fn save_instrument(&self, value: &InstrumentEntry) {
        let mut buf = Self::header(RecordType::Instrument);
        let id = InstrumentCodec::encode(value, &mut buf);
        self.sink.save(id, &buf);
    }

    pub fn save_string(&self, id: IdT, value: &str) {
        let mut buf = Self::header(RecordType::String);
        StringCodec::encode(value, &mut buf);
        self.sink.save(id, &buf);
    }

    pub fn save_account(&self, value: &AccountEntry) {
        let mut buf = Self::header(RecordType::Account);
        let id = AccountCodec::encode(value, &mut buf);
        self.sink.save(id, &buf);
    }

    pub fn save_clearing(&self, value: &ClearingEntry) {
        let mut buf = Self::header(RecordType::Clearing);
        let id = ClearingCodec::encode(value, &mut buf);
        self.sink.save(id, &buf);
    }

    pub fn save_raw_data(&self, value: &RawDataEntry) {
        let mut buf = Self::header(RecordType::RawData);
        let id = RawDataCodec::encode(value, &mut buf);
        self.sink.save(id, &buf);
    }

    pub fn save_order(&self, value: &OrderEntry) {
        let mut buf = Self::header(RecordType::Order);
        let id = OrderCodec::encode(value, &mut buf);
        self.sink.save(id, &buf);
    }

    /// Decodes one loaded record and routes it to its restore target.
    ///
    /// A malformed or unknown record fails here; the loader logs it and
    /// carries on with the rest of the log.
    pub fn on_record_loaded(&self, id: IdT, mut record: &[u8]) -> Result<()> {
        if record.remaining() < 8 {
            return Err(EngineError::InvalidFormat(
                "record shorter than its header".into(),
            ));
        }
        let raw_type = record.get_u32_ne();
        let version = record.get_u32_ne();
        let record_type = RecordType::from_u32(raw_type)
            .ok_or(EngineError::UnknownRecord(raw_type))?;

        match record_type {
            RecordType::Instrument => {
                let value = InstrumentCodec::decode(id, version, record)?;
                // A listed instrument implies a book.
                self.books.add_instrument(value.id);
                self.wide.restore_instrument(value);
            }
            RecordType::String => {
                let value = StringCodec::decode(record)?;
                self.wide.restore_string(id, value);
            }
            RecordType::Account => {
                let value = AccountCodec::decode(id, version, record)?;
                self.wide.restore_account(value);
            }
            RecordType::Clearing => {
                let value = ClearingCodec::decode(id, version, record)?;
                self.wide.restore_clearing(value);
            }
            RecordType::RawData => {
                let value = RawDataCodec::decode(id, version, record)?;
                self.wide.restore_raw_data(value);
            }
            RecordType::Execution | RecordType::ExecutionList => {
                // Recognized but not restored; execution history is rebuilt
                // from order records.
            }
            RecordType::Order => {
                let value = OrderCodec::decode(id, version, record)?;
                if let Some(book) = self.books.book(value.instrument_id()) {
                    let mut book = book.lock();
                    // Later records supersede earlier ones; drop any booking
                    // made by a previous version of this order.
                    if let Some(previous) = self.orders.get(value.order_id) {
                        book.remove(previous.side, previous.price, value.order_id);
                    }
                    book.restore(&value);
                } else {
                    warn!(order = %id, "restored order references unlisted instrument");
                }
                let cl_key = self
                    .wide
                    .raw_data(value.cl_order_id.id())
                    .map(|raw| raw.data.clone());
                self.orders.restore(cl_key, value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::IdGenerator;
    use parking_lot::Mutex;

    struct CaptureSink(Mutex<Vec<(IdT, Vec<u8>)>>);

    impl RecordSink for CaptureSink {
        fn save(&self, id: IdT, record: &[u8]) {
            self.0.lock().push((id, record.to_vec()));
        }
    }

    struct Fixture {
        wide: Arc<WideDataStorage>,
        books: Arc<BookSet>,
        orders: Arc<OrderStorage>,
        sink: Arc<CaptureSink>,
        dispatcher: RecordDispatcher,
    }

    fn fixture() -> Fixture {
        let wide = Arc::new(WideDataStorage::new(Arc::new(IdGenerator::new(20260801))));
        let books = Arc::new(BookSet::new());
        let orders = Arc::new(OrderStorage::new());
        let sink = Arc::new(CaptureSink(Mutex::new(Vec::new())));
        let dispatcher = RecordDispatcher::new(
            Arc::clone(&wide),
            Arc::clone(&books),
            Arc::clone(&orders),
            sink.clone() as Arc<dyn RecordSink>,
        );
        Fixture {
            wide,
            books,
            orders,
            sink,
            dispatcher,
        }
    }

    #[test]
    fn test_save_then_load_restores_wide_entities() {
        let fx = fixture();
        let instrument = InstrumentEntry {
            id: IdT::new(3, 20260801),
            symbol: "AAPL".into(),
            ..Default::default()
        };
        fx.dispatcher.save_instrument(&instrument);
        fx.dispatcher.save_string(IdT::new(4, 20260801), "NASDAQ");

        let records = fx.sink.0.lock().clone();
        assert_eq!(records.len(), 2);
        for (id, record) in &records {
            fx.dispatcher.on_record_loaded(*id, record).unwrap();
        }
        assert_eq!(
            fx.wide.instrument(instrument.id).unwrap().symbol,
            "AAPL"
        );
        assert_eq!(
            fx.wide.string(IdT::new(4, 20260801)).unwrap().as_str(),
            "NASDAQ"
        );
    }

    #[test]
    fn test_order_record_restores_book_and_storage() {
        let fx = fixture();
        let instr_id = fx.wide.add_instrument(InstrumentEntry {
            symbol: "AAPL".into(),
            ..Default::default()
        });
        fx.books.add_instrument(instr_id);
        let cl = fx
            .wide
            .add_raw_data(RawDataEntry::from_text("CL-77"));

        let mut order = OrderEntry::default();
        order.order_id = IdT::new(77, 20260801);
        order.instrument = crate::model::LazyRef::new(instr_id);
        order.cl_order_id = crate::model::LazyRef::new(cl);
        order.side = crate::model::Side::Buy;
        order.price = 10.0;
        order.order_qty = 100;
        order.leaves_qty = 100;
        order.status = crate::model::OrderStatus::New;
        fx.dispatcher.save_order(&order);

        let records = fx.sink.0.lock().clone();
        let (id, record) = records.last().unwrap().clone();
        fx.dispatcher.on_record_loaded(id, &record).unwrap();

        assert!(fx.orders.contains(order.order_id));
        assert_eq!(
            fx.orders.locate_by_cl_order_id(b"CL-77"),
            Some(order.order_id)
        );
        let book = fx.books.book(instr_id).unwrap();
        assert_eq!(book.lock().depth(), 1);
    }

    #[test]
    fn test_unknown_record_type_is_an_error() {
        let fx = fixture();
        let mut record = Vec::new();
        record.put_u32_ne(999u32);
        record.put_u32_ne(CODEC_VERSION);
        let err = fx
            .dispatcher
            .on_record_loaded(IdT::new(1, 1), &record)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownRecord(999)));
    }

    #[test]
    fn test_short_record_is_invalid_format() {
        let fx = fixture();
        let err = fx
            .dispatcher
            .on_record_loaded(IdT::new(1, 1), &[1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidFormat(_)));
    }
}
