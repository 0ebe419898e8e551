// Per-entity codecs for the durable record log.
//
// Encoding is deliberately host-native and NOT portable across endianness or
// word size: the log is a single-machine recovery artifact. Strings are
// `[len: u64][bytes]`; fixed numerics are host byte order; composite records
// concatenate their fields separated by a single `.` byte which the decoder
// asserts.

use bytes::{Buf, BufMut};

use crate::common::IdT;
use crate::error::{EngineError, Result};
use crate::model::{
    AccountEntry, AccountType, Capacity, ClearingEntry, Currency, InstrumentEntry, OrderEntry,
    OrderStatus, OrderType, RawDataEntry, RawDataType, SettlType, Side, TimeInForce,
};

const SEPARATOR: u8 = b'.';

// --- primitive helpers ----------------------------------------------------

pub(crate) fn put_string(buf: &mut Vec<u8>, value: &str) {
    buf.put_u64_ne(value.len() as u64);
    buf.put_slice(value.as_bytes());
}

pub(crate) fn get_string(buf: &mut &[u8], what: &str) -> Result<String> {
    let len = get_u64(buf, what)? as usize;
    if buf.remaining() < len {
        return Err(truncated(what));
    }
    let value = String::from_utf8(buf[..len].to_vec())
        .map_err(|_| EngineError::InvalidFormat(format!("{what}: non-utf8 string payload")))?;
    buf.advance(len);
    Ok(value)
}

pub(crate) fn put_separator(buf: &mut Vec<u8>) {
    buf.put_u8(SEPARATOR);
}

pub(crate) fn expect_separator(buf: &mut &[u8], what: &str) -> Result<()> {
    if buf.remaining() < 1 {
        return Err(truncated(what));
    }
    if buf.get_u8() != SEPARATOR {
        return Err(EngineError::InvalidFormat(format!(
            "missing '.' separator after {what}"
        )));
    }
    Ok(())
}

pub(crate) fn put_id(buf: &mut Vec<u8>, id: IdT) {
    buf.put_u64_ne(id.id);
    buf.put_u32_ne(id.date);
}

pub(crate) fn get_id(buf: &mut &[u8], what: &str) -> Result<IdT> {
    let id = get_u64(buf, what)?;
    let date = get_u32(buf, what)?;
    Ok(IdT::new(id, date))
}

fn get_u64(buf: &mut &[u8], what: &str) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(truncated(what));
    }
    Ok(buf.get_u64_ne())
}

pub(crate) fn get_u32(buf: &mut &[u8], what: &str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(truncated(what));
    }
    Ok(buf.get_u32_ne())
}

fn get_f64(buf: &mut &[u8], what: &str) -> Result<f64> {
    if buf.remaining() < 8 {
        return Err(truncated(what));
    }
    Ok(buf.get_f64_ne())
}

fn truncated(what: &str) -> EngineError {
    EngineError::InvalidFormat(format!("buffer too small decoding {what}"))
}

// --- entity codecs --------------------------------------------------------

/// Instrument payload: `symbol . security_id . security_id_source`.
pub struct InstrumentCodec;

impl InstrumentCodec {
    pub fn encode(value: &InstrumentEntry, buf: &mut Vec<u8>) -> IdT {
        put_string(buf, &value.symbol);
        put_separator(buf);
        put_string(buf, &value.security_id);
        put_separator(buf);
        put_string(buf, &value.security_id_source);
        value.id
    }

    pub fn decode(id: IdT, _version: u32, mut buf: &[u8]) -> Result<InstrumentEntry> {
        let symbol = get_string(&mut buf, "instrument symbol")?;
        expect_separator(&mut buf, "instrument symbol")?;
        let security_id = get_string(&mut buf, "instrument security_id")?;
        expect_separator(&mut buf, "instrument security_id")?;
        let security_id_source = get_string(&mut buf, "instrument security_id_source")?;
        Ok(InstrumentEntry {
            id,
            symbol,
            security_id,
            security_id_source,
        })
    }
}

/// Bare string payload.
pub struct StringCodec;

impl StringCodec {
    pub fn encode(value: &str, buf: &mut Vec<u8>) {
        put_string(buf, value);
    }

    pub fn decode(mut buf: &[u8]) -> Result<String> {
        get_string(&mut buf, "string record")
    }
}

/// Account payload: `account . firm . [type: u32]`.
pub struct AccountCodec;

impl AccountCodec {
    pub fn encode(value: &AccountEntry, buf: &mut Vec<u8>) -> IdT {
        put_string(buf, &value.account);
        put_separator(buf);
        put_string(buf, &value.firm);
        put_separator(buf);
        buf.put_u32_ne(value.account_type.as_u32());
        value.id
    }

    pub fn decode(id: IdT, _version: u32, mut buf: &[u8]) -> Result<AccountEntry> {
        let account = get_string(&mut buf, "account name")?;
        expect_separator(&mut buf, "account name")?;
        let firm = get_string(&mut buf, "account firm")?;
        expect_separator(&mut buf, "account firm")?;
        let account_type = AccountType::from_u32(get_u32(&mut buf, "account type")?);
        Ok(AccountEntry {
            id,
            account,
            firm,
            account_type,
        })
    }
}

/// Clearing payload: `firm`.
pub struct ClearingCodec;

impl ClearingCodec {
    pub fn encode(value: &ClearingEntry, buf: &mut Vec<u8>) -> IdT {
        put_string(buf, &value.firm);
        value.id
    }

    pub fn decode(id: IdT, _version: u32, mut buf: &[u8]) -> Result<ClearingEntry> {
        let firm = get_string(&mut buf, "clearing firm")?;
        Ok(ClearingEntry { id, firm })
    }
}

/// Raw-data payload: `[kind: u32] . [len: u32] . bytes`.
pub struct RawDataCodec;

impl RawDataCodec {
    pub fn encode(value: &RawDataEntry, buf: &mut Vec<u8>) -> IdT {
        buf.put_u32_ne(value.kind.as_u32());
        put_separator(buf);
        buf.put_u32_ne(value.data.len() as u32);
        put_separator(buf);
        buf.put_slice(&value.data);
        value.id
    }

    pub fn decode(id: IdT, _version: u32, mut buf: &[u8]) -> Result<RawDataEntry> {
        let kind = RawDataType::from_u32(get_u32(&mut buf, "raw-data kind")?);
        expect_separator(&mut buf, "raw-data kind")?;
        let len = get_u32(&mut buf, "raw-data length")? as usize;
        expect_separator(&mut buf, "raw-data length")?;
        if buf.remaining() < len {
            return Err(truncated("raw-data bytes"));
        }
        // Decoded bytes are owned by the entry.
        let data = buf[..len].to_vec();
        Ok(RawDataEntry { id, kind, data })
    }
}

/// Order payload: reference ids, then timestamps, prices, enums and
/// quantities, every field dot-separated in a fixed order.
pub struct OrderCodec;

impl OrderCodec {
    pub fn encode(value: &OrderEntry, buf: &mut Vec<u8>) -> IdT {
        for id in [
            value.instrument.id(),
            value.account.id(),
            value.clearing.id(),
            value.destination.id(),
            value.cl_order_id.id(),
            value.orig_cl_order_id.id(),
            value.source.id(),
            value.executions.id(),
            value.orig_order_id,
        ] {
            put_id(buf, id);
            put_separator(buf);
        }

        for stamp in [
            value.creation_time,
            value.last_update_time,
            value.expire_time,
            value.settl_date,
        ] {
            buf.put_u64_ne(stamp);
            put_separator(buf);
        }

        for price in [value.price, value.stop_px, value.avg_px, value.day_avg_px] {
            buf.put_f64_ne(price);
            put_separator(buf);
        }

        for tag in [
            value.status.as_u32(),
            value.side.as_u32(),
            value.ord_type.as_u32(),
            value.tif.as_u32(),
            value.settl_type.as_u32(),
            value.capacity.as_u32(),
            value.currency.as_u32(),
        ] {
            buf.put_u32_ne(tag);
            put_separator(buf);
        }

        for qty in [
            value.min_qty,
            value.order_qty,
            value.leaves_qty,
            value.cum_qty,
            value.day_order_qty,
        ] {
            buf.put_u32_ne(qty);
            put_separator(buf);
        }
        buf.put_u32_ne(value.day_cum_qty);

        value.order_id
    }

    pub fn decode(id: IdT, _version: u32, mut buf: &[u8]) -> Result<OrderEntry> {
        let buf = &mut buf;
        let mut ref_id = |what: &str| -> Result<IdT> {
            let value = get_id(buf, what)?;
            expect_separator(buf, what)?;
            Ok(value)
        };

        let instrument = ref_id("order instrument ref")?;
        let account = ref_id("order account ref")?;
        let clearing = ref_id("order clearing ref")?;
        let destination = ref_id("order destination ref")?;
        let cl_order_id = ref_id("order cl_order_id ref")?;
        let orig_cl_order_id = ref_id("order orig_cl_order_id ref")?;
        let source = ref_id("order source ref")?;
        let executions = ref_id("order executions ref")?;
        let orig_order_id = ref_id("order orig_order_id")?;

        let mut order = OrderEntry::new(
            source,
            destination,
            cl_order_id,
            orig_cl_order_id,
            instrument,
            account,
            clearing,
            executions,
        );
        order.order_id = id;
        order.orig_order_id = orig_order_id;

        let mut stamp = |what: &str| -> Result<u64> {
            let value = get_u64(buf, what)?;
            expect_separator(buf, what)?;
            Ok(value)
        };
        order.creation_time = stamp("order creation_time")?;
        order.last_update_time = stamp("order last_update_time")?;
        order.expire_time = stamp("order expire_time")?;
        order.settl_date = stamp("order settl_date")?;

        let mut price = |what: &str| -> Result<f64> {
            let value = get_f64(buf, what)?;
            expect_separator(buf, what)?;
            Ok(value)
        };
        order.price = price("order price")?;
        order.stop_px = price("order stop_px")?;
        order.avg_px = price("order avg_px")?;
        order.day_avg_px = price("order day_avg_px")?;

        let mut tag = |what: &str| -> Result<u32> {
            let value = get_u32(buf, what)?;
            expect_separator(buf, what)?;
            Ok(value)
        };
        order.status = OrderStatus::from_u32(tag("order status")?);
        order.side = Side::from_u32(tag("order side")?);
        order.ord_type = OrderType::from_u32(tag("order ord_type")?);
        order.tif = TimeInForce::from_u32(tag("order tif")?);
        order.settl_type = SettlType::from_u32(tag("order settl_type")?);
        order.capacity = Capacity::from_u32(tag("order capacity")?);
        order.currency = Currency::from_u32(tag("order currency")?);

        order.min_qty = tag("order min_qty")?;
        order.order_qty = tag("order order_qty")?;
        order.leaves_qty = tag("order leaves_qty")?;
        order.cum_qty = tag("order cum_qty")?;
        order.day_order_qty = tag("order day_order_qty")?;
        order.day_cum_qty = get_u32(buf, "order day_cum_qty")?;

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        let mut buf = Vec::new();
        StringCodec::encode("NASDAQ", &mut buf);
        assert_eq!(StringCodec::decode(&buf).unwrap(), "NASDAQ");

        let mut empty = Vec::new();
        StringCodec::encode("", &mut empty);
        assert_eq!(StringCodec::decode(&empty).unwrap(), "");
    }

    #[test]
    fn test_instrument_round_trip() {
        let value = InstrumentEntry {
            id: IdT::new(3, 20260801),
            symbol: "AAPL".into(),
            security_id: "037833100".into(),
            security_id_source: "CUSIP".into(),
        };
        let mut buf = Vec::new();
        let id = InstrumentCodec::encode(&value, &mut buf);
        let decoded = InstrumentCodec::decode(id, 0, &buf).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_account_round_trip() {
        let value = AccountEntry {
            id: IdT::new(4, 20260801),
            account: "ACT".into(),
            firm: "ACTFirm".into(),
            account_type: AccountType::Principal,
        };
        let mut buf = Vec::new();
        let id = AccountCodec::encode(&value, &mut buf);
        assert_eq!(AccountCodec::decode(id, 0, &buf).unwrap(), value);
    }

    #[test]
    fn test_clearing_round_trip() {
        let value = ClearingEntry {
            id: IdT::new(5, 20260801),
            firm: "CLRFirm".into(),
        };
        let mut buf = Vec::new();
        let id = ClearingCodec::encode(&value, &mut buf);
        assert_eq!(ClearingCodec::decode(id, 0, &buf).unwrap(), value);
    }

    #[test]
    fn test_raw_data_round_trip() {
        let mut value = RawDataEntry::new(RawDataType::String, b"TestClOrderId".to_vec());
        value.id = IdT::new(6, 20260801);
        let mut buf = Vec::new();
        let id = RawDataCodec::encode(&value, &mut buf);
        assert_eq!(RawDataCodec::decode(id, 0, &buf).unwrap(), value);
    }

    #[test]
    fn test_order_round_trip_preserves_every_field() {
        let mut order = OrderEntry::new(
            IdT::new(10, 1),
            IdT::new(11, 1),
            IdT::new(12, 1),
            IdT::new(13, 1),
            IdT::new(14, 1),
            IdT::new(15, 1),
            IdT::new(16, 1),
            IdT::new(17, 1),
        );
        order.order_id = IdT::new(100, 20260801);
        order.orig_order_id = IdT::new(99, 20260801);
        order.creation_time = 100;
        order.last_update_time = 115;
        order.expire_time = 175;
        order.settl_date = 225;
        order.price = 1.46;
        order.stop_px = 1.5;
        order.avg_px = 1.47;
        order.day_avg_px = 1.48;
        order.status = OrderStatus::PartFill;
        order.side = Side::Buy;
        order.ord_type = OrderType::Limit;
        order.tif = TimeInForce::Day;
        order.settl_type = SettlType::TPlus3;
        order.capacity = Capacity::Principal;
        order.currency = Currency::Usd;
        order.min_qty = 5;
        order.order_qty = 100;
        order.leaves_qty = 60;
        order.cum_qty = 40;
        order.day_order_qty = 100;
        order.day_cum_qty = 40;

        let mut buf = Vec::new();
        let id = OrderCodec::encode(&order, &mut buf);
        let decoded = OrderCodec::decode(id, 0, &buf).unwrap();

        assert_eq!(decoded.order_id, order.order_id);
        assert_eq!(decoded.orig_order_id, order.orig_order_id);
        assert_eq!(decoded.instrument.id(), order.instrument.id());
        assert_eq!(decoded.account.id(), order.account.id());
        assert_eq!(decoded.clearing.id(), order.clearing.id());
        assert_eq!(decoded.destination.id(), order.destination.id());
        assert_eq!(decoded.cl_order_id.id(), order.cl_order_id.id());
        assert_eq!(decoded.orig_cl_order_id.id(), order.orig_cl_order_id.id());
        assert_eq!(decoded.source.id(), order.source.id());
        assert_eq!(decoded.executions.id(), order.executions.id());
        assert_eq!(decoded.creation_time, order.creation_time);
        assert_eq!(decoded.last_update_time, order.last_update_time);
        assert_eq!(decoded.expire_time, order.expire_time);
        assert_eq!(decoded.settl_date, order.settl_date);
        assert_eq!(decoded.price, order.price);
        assert_eq!(decoded.stop_px, order.stop_px);
        assert_eq!(decoded.avg_px, order.avg_px);
        assert_eq!(decoded.day_avg_px, order.day_avg_px);
        assert_eq!(decoded.status, order.status);
        assert_eq!(decoded.side, order.side);
        assert_eq!(decoded.ord_type, order.ord_type);
        assert_eq!(decoded.tif, order.tif);
        assert_eq!(decoded.settl_type, order.settl_type);
        assert_eq!(decoded.capacity, order.capacity);
        assert_eq!(decoded.currency, order.currency);
        assert_eq!(decoded.min_qty, order.min_qty);
        assert_eq!(decoded.order_qty, order.order_qty);
        assert_eq!(decoded.leaves_qty, order.leaves_qty);
        assert_eq!(decoded.cum_qty, order.cum_qty);
        assert_eq!(decoded.day_order_qty, order.day_order_qty);
        assert_eq!(decoded.day_cum_qty, order.day_cum_qty);
    }

    #[test]
    fn test_corrupt_separator_is_rejected() {
        let value = InstrumentEntry {
            id: IdT::new(3, 1),
            symbol: "AAPL".into(),
            security_id: "X".into(),
            security_id_source: "Y".into(),
        };
        let mut buf = Vec::new();
        InstrumentCodec::encode(&value, &mut buf);
        // Clobber the separator after the symbol.
        let dot = 8 + "AAPL".len();
        buf[dot] = b'!';
        let err = InstrumentCodec::decode(value.id, 0, &buf).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFormat(_)));
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let value = ClearingEntry {
            id: IdT::new(5, 1),
            firm: "CLR".into(),
        };
        let mut buf = Vec::new();
        ClearingCodec::encode(&value, &mut buf);
        let err = ClearingCodec::decode(value.id, 0, &buf[..4]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFormat(_)));
    }
}
