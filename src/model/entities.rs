// Reference-data entities shared through the wide-data store.

use serde::{Deserialize, Serialize};

use crate::common::{IdT, Price, Quantity};

use super::enums::{AccountType, ExecType, OrderStatus, RawDataType};

/// Tradable instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentEntry {
    pub id: IdT,
    pub symbol: String,
    pub security_id: String,
    pub security_id_source: String,
}

impl InstrumentEntry {
    pub fn is_valid(&self, invalid: &mut String) -> bool {
        if self.symbol.is_empty() {
            invalid.push_str("symbol");
            return false;
        }
        true
    }
}

/// Trading account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: IdT,
    pub account: String,
    pub firm: String,
    pub account_type: AccountType,
}

/// Clearing firm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearingEntry {
    pub id: IdT,
    pub firm: String,
}

/// Opaque client-supplied payload (client order ids, free-form messages).
///
/// The entry owns its bytes; decoding allocates into the entry, so there is
/// no external buffer to release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDataEntry {
    pub id: IdT,
    pub kind: RawDataType,
    pub data: Vec<u8>,
}

impl RawDataEntry {
    pub fn new(kind: RawDataType, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: IdT::default(),
            kind,
            data: data.into(),
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(RawDataType::String, text.as_bytes().to_vec())
    }
}

/// Reference to one execution event attached to an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRef {
    pub event_id: IdT,
}

/// Ordered execution history of one order.
pub type ExecutionList = Vec<ExecutionRef>;

/// Payload of an execution report pushed to the outgoing queues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub exec_id: IdT,
    pub order_id: IdT,
    pub exec_type: ExecType,
    pub order_status: OrderStatus,
    pub last_qty: Quantity,
    pub last_px: Price,
    pub leaves_qty: Quantity,
    pub cum_qty: Quantity,
    pub avg_px: Price,
    pub transact_time: u64,
    /// Order on the other side of a trade; invalid for non-trade reports.
    pub contra_order_id: IdT,
}
