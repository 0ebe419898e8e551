// Write requests for the Postgres mirror.
//
// Each variant is self-contained: strings are owned, lazy references are
// resolved at build time, enums arrive as their SQL labels. Nothing points
// back into the live model, so the background writer can outlive any order.

use tracing::warn;

use crate::model::{
    AccountEntry, ClearingEntry, InstrumentEntry, OrderEntry, WideDataStorage,
};

use super::sql::SqlEnum;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentWrite {
    pub symbol: String,
    pub security_id: String,
    pub security_id_source: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountWrite {
    pub account: String,
    pub firm: String,
    pub account_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClearingWrite {
    pub firm: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderWrite {
    pub order_id: u64,
    pub order_date: u32,
    pub cl_order_id: String,
    pub orig_cl_order_id: String,
    pub source: String,
    pub destination: String,
    pub instrument_symbol: String,
    pub account_name: String,
    pub clearing_firm: String,

    pub side: String,
    pub ord_type: String,
    pub status: String,
    pub tif: String,
    pub capacity: String,
    pub currency: String,
    /// Empty means NULL in the mirror.
    pub settl_type: String,

    pub price: f64,
    pub stop_px: f64,
    pub avg_px: f64,
    pub day_avg_px: f64,

    pub min_qty: u32,
    pub order_qty: u32,
    pub leaves_qty: u32,
    pub cum_qty: u32,
    pub day_order_qty: u32,
    pub day_cum_qty: u32,

    pub expire_time: u64,
    pub settl_date: u64,
}

/// One unit of work for the write-behind worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Instrument(InstrumentWrite),
    Account(AccountWrite),
    Clearing(ClearingWrite),
    Order(OrderWrite),
}

impl WriteRequest {
    /// Checks the row against the mirror's enum domains. A field whose
    /// domain enum mapped to none is unwritable; the worker counts it as a
    /// permanent error. `settl_type` is nullable and may be empty.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            WriteRequest::Instrument(w) => {
                if w.symbol.is_empty() {
                    return Err("instrument write without a symbol".into());
                }
            }
            WriteRequest::Account(w) => {
                if w.account_type.is_empty() {
                    return Err(format!("account '{}' has an invalid type", w.account));
                }
            }
            WriteRequest::Clearing(w) => {
                if w.firm.is_empty() {
                    return Err("clearing write without a firm".into());
                }
            }
            WriteRequest::Order(w) => {
                for (field, value) in [
                    ("side", &w.side),
                    ("ord_type", &w.ord_type),
                    ("status", &w.status),
                    ("time_in_force", &w.tif),
                    ("capacity", &w.capacity),
                    ("currency", &w.currency),
                ] {
                    if value.is_empty() {
                        return Err(format!("order {} has an invalid {field}", w.order_id));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builds self-contained write requests from live entities.
pub struct RequestBuilder;

impl RequestBuilder {
    pub fn from_instrument(value: &InstrumentEntry) -> InstrumentWrite {
        InstrumentWrite {
            symbol: value.symbol.clone(),
            security_id: value.security_id.clone(),
            security_id_source: value.security_id_source.clone(),
        }
    }

    pub fn from_account(value: &AccountEntry) -> AccountWrite {
        AccountWrite {
            account: value.account.clone(),
            firm: value.firm.clone(),
            account_type: sql_or_empty(value.account_type.as_sql()),
        }
    }

    pub fn from_clearing(value: &ClearingEntry) -> ClearingWrite {
        ClearingWrite {
            firm: value.firm.clone(),
        }
    }

    /// Resolves the order's lazy references through the wide store and maps
    /// its enums; unresolvable references become empty strings and are
    /// logged.
    pub fn from_order(value: &OrderEntry, wide: &WideDataStorage) -> OrderWrite {
        let mut w = OrderWrite {
            order_id: value.order_id.id,
            order_date: value.order_id.date,
            ..Default::default()
        };

        match value.instrument.get(wide) {
            Some(instrument) => w.instrument_symbol = instrument.symbol.clone(),
            None => warn!(order = %value.order_id, "order instrument unresolvable"),
        }
        if let Some(account) = value.account.get(wide) {
            w.account_name = account.account.clone();
        }
        if let Some(clearing) = value.clearing.get(wide) {
            w.clearing_firm = clearing.firm.clone();
        }
        if let Some(source) = value.source.get(wide) {
            w.source = source.as_str().to_string();
        }
        if let Some(destination) = value.destination.get(wide) {
            w.destination = destination.as_str().to_string();
        }
        if let Some(raw) = value.cl_order_id.get(wide) {
            w.cl_order_id = String::from_utf8_lossy(&raw.data).into_owned();
        }
        if let Some(raw) = value.orig_cl_order_id.get(wide) {
            w.orig_cl_order_id = String::from_utf8_lossy(&raw.data).into_owned();
        }

        w.side = sql_or_empty(value.side.as_sql());
        w.ord_type = sql_or_empty(value.ord_type.as_sql());
        w.status = sql_or_empty(value.status.as_sql());
        w.tif = sql_or_empty(value.tif.as_sql());
        w.capacity = sql_or_empty(value.capacity.as_sql());
        w.currency = sql_or_empty(value.currency.as_sql());
        w.settl_type = sql_or_empty(value.settl_type.as_sql());

        w.price = value.price;
        w.stop_px = value.stop_px;
        w.avg_px = value.avg_px;
        w.day_avg_px = value.day_avg_px;

        w.min_qty = value.min_qty;
        w.order_qty = value.order_qty;
        w.leaves_qty = value.leaves_qty;
        w.cum_qty = value.cum_qty;
        w.day_order_qty = value.day_order_qty;
        w.day_cum_qty = value.day_cum_qty;

        w.expire_time = value.expire_time;
        w.settl_date = value.settl_date;

        w
    }
}

fn sql_or_empty(value: Option<&'static str>) -> String {
    value.unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{IdGenerator, IdT};
    use crate::model::{
        AccountType, Capacity, Currency, LazyRef, OrderStatus, OrderType, RawDataEntry, SettlType,
        Side, TimeInForce,
    };
    use std::sync::Arc;

    #[test]
    fn test_order_write_resolves_references_and_enums() {
        let wide = WideDataStorage::new(Arc::new(IdGenerator::new(20260801)));
        let instrument = wide.add_instrument(InstrumentEntry {
            symbol: "AAPL".into(),
            ..Default::default()
        });
        let account = wide.add_account(AccountEntry {
            account: "ACT".into(),
            firm: "ACTFirm".into(),
            account_type: AccountType::Principal,
            ..Default::default()
        });
        let clearing = wide.add_clearing(ClearingEntry {
            firm: "CLRFirm".into(),
            ..Default::default()
        });
        let source = wide.add_string("CLNT");
        let destination = wide.add_string("NASDAQ");
        let cl = wide.add_raw_data(RawDataEntry::from_text("CL-1"));

        let mut order = OrderEntry::default();
        order.order_id = IdT::new(42, 20260801);
        order.instrument = LazyRef::new(instrument);
        order.account = LazyRef::new(account);
        order.clearing = LazyRef::new(clearing);
        order.source = LazyRef::new(source);
        order.destination = LazyRef::new(destination);
        order.cl_order_id = LazyRef::new(cl);
        order.side = Side::Buy;
        order.ord_type = OrderType::Limit;
        order.status = OrderStatus::New;
        order.tif = TimeInForce::Day;
        order.capacity = Capacity::Principal;
        order.currency = Currency::Usd;
        order.settl_type = SettlType::TPlus3;
        order.price = 1.46;
        order.order_qty = 100;
        order.leaves_qty = 100;

        let w = RequestBuilder::from_order(&order, &wide);
        assert_eq!(w.order_id, 42);
        assert_eq!(w.order_date, 20260801);
        assert_eq!(w.instrument_symbol, "AAPL");
        assert_eq!(w.account_name, "ACT");
        assert_eq!(w.clearing_firm, "CLRFirm");
        assert_eq!(w.source, "CLNT");
        assert_eq!(w.destination, "NASDAQ");
        assert_eq!(w.cl_order_id, "CL-1");
        assert_eq!(w.side, "BUY");
        assert_eq!(w.settl_type, "T_PLUS_3");
        assert!(WriteRequest::Order(w).validate().is_ok());
    }

    #[test]
    fn test_invalid_enum_fails_validation() {
        let wide = WideDataStorage::new(Arc::new(IdGenerator::new(20260801)));
        let mut order = OrderEntry::default();
        order.order_id = IdT::new(1, 20260801);
        // Side stays Invalid.
        order.ord_type = OrderType::Limit;
        order.status = OrderStatus::New;
        order.tif = TimeInForce::Day;
        order.capacity = Capacity::Principal;
        order.currency = Currency::Usd;

        let w = RequestBuilder::from_order(&order, &wide);
        assert!(w.side.is_empty());
        assert!(WriteRequest::Order(w).validate().is_err());
    }

    #[test]
    fn test_empty_settl_type_is_allowed() {
        let write = OrderWrite {
            order_id: 1,
            side: "BUY".into(),
            ord_type: "LIMIT".into(),
            status: "NEW".into(),
            tif: "DAY".into(),
            capacity: "AGENCY".into(),
            currency: "USD".into(),
            ..Default::default()
        };
        assert!(WriteRequest::Order(write).validate().is_ok());
    }

    #[test]
    fn test_account_with_invalid_type_fails_validation() {
        let account = AccountEntry {
            account: "ACT".into(),
            firm: "F".into(),
            account_type: AccountType::Invalid,
            ..Default::default()
        };
        let w = RequestBuilder::from_account(&account);
        assert!(WriteRequest::Account(w).validate().is_err());
    }
}
