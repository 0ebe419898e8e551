// The order entity and its amendment parameters.

use crate::common::{DateTime, IdT, Price, Quantity, SourceId};

use super::entities::{
    AccountEntry, ClearingEntry, ExecutionList, InstrumentEntry, RawDataEntry,
};
use super::enums::{Capacity, Currency, OrderStatus, OrderType, SettlType, Side, TimeInForce};
use super::wide::LazyRef;

/// A trading instruction.
///
/// Reference data (instrument, account, clearing, session strings, client
/// order ids, execution history) is carried as lazy handles into the
/// wide-data store; everything else is inline. The engine-assigned
/// `order_id` is the storage key.
#[derive(Debug, Clone, Default)]
pub struct OrderEntry {
    pub order_id: IdT,
    pub orig_order_id: IdT,

    pub instrument: LazyRef<InstrumentEntry>,
    pub account: LazyRef<AccountEntry>,
    pub clearing: LazyRef<ClearingEntry>,
    pub source: LazyRef<String>,
    pub destination: LazyRef<String>,
    pub cl_order_id: LazyRef<RawDataEntry>,
    pub orig_cl_order_id: LazyRef<RawDataEntry>,
    pub executions: LazyRef<ExecutionList>,

    pub creation_time: DateTime,
    pub last_update_time: DateTime,
    pub expire_time: DateTime,
    pub settl_date: DateTime,

    pub price: Price,
    pub stop_px: Price,
    pub avg_px: Price,
    pub day_avg_px: Price,

    pub status: OrderStatus,
    pub side: Side,
    pub ord_type: OrderType,
    pub tif: TimeInForce,
    pub settl_type: SettlType,
    pub capacity: Capacity,
    pub currency: Currency,

    pub min_qty: Quantity,
    pub order_qty: Quantity,
    pub leaves_qty: Quantity,
    pub cum_qty: Quantity,
    pub day_order_qty: Quantity,
    pub day_cum_qty: Quantity,
}

impl OrderEntry {
    /// Builds an order from its reference-data ids, mirroring the wide-store
    /// handles an ingest session resolves up front.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: SourceId,
        destination: SourceId,
        cl_order_id: SourceId,
        orig_cl_order_id: SourceId,
        instrument: SourceId,
        account: SourceId,
        clearing: SourceId,
        executions: SourceId,
    ) -> Self {
        Self {
            source: LazyRef::new(source),
            destination: LazyRef::new(destination),
            cl_order_id: LazyRef::new(cl_order_id),
            orig_cl_order_id: LazyRef::new(orig_cl_order_id),
            instrument: LazyRef::new(instrument),
            account: LazyRef::new(account),
            clearing: LazyRef::new(clearing),
            executions: LazyRef::new(executions),
            ..Default::default()
        }
    }

    #[inline]
    pub fn instrument_id(&self) -> SourceId {
        self.instrument.id()
    }

    /// Applies one fill: rolls quantity and average-price accumulators and
    /// moves the status to `PartFill` or `Filled`.
    pub fn apply_fill(&mut self, qty: Quantity, px: Price, now: DateTime) {
        debug_assert!(qty > 0 && qty <= self.leaves_qty);
        let prev_cum = self.cum_qty as f64;
        let traded = qty as f64;
        self.avg_px = (self.avg_px * prev_cum + px * traded) / (prev_cum + traded);
        self.cum_qty += qty;
        self.leaves_qty -= qty;
        self.day_cum_qty += qty;
        self.day_avg_px = self.avg_px;
        self.status = if self.leaves_qty == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartFill
        };
        self.last_update_time = now;
    }
}

/// Amendment payload of a cancel/replace request. Absent fields keep the
/// order's current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplaceParams {
    pub price: Option<Price>,
    pub order_qty: Option<Quantity>,
    pub stop_px: Option<Price>,
    pub tif: Option<TimeInForce>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn working_order(qty: Quantity) -> OrderEntry {
        let mut order = OrderEntry::default();
        order.order_qty = qty;
        order.leaves_qty = qty;
        order.status = OrderStatus::New;
        order
    }

    #[test]
    fn test_partial_fill_keeps_order_working() {
        let mut order = working_order(100);
        order.apply_fill(40, 10.0, 1);
        assert_eq!(order.status, OrderStatus::PartFill);
        assert_eq!(order.leaves_qty, 60);
        assert_eq!(order.cum_qty, 40);
        assert!((order.avg_px - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_fill_terminates_order() {
        let mut order = working_order(100);
        order.apply_fill(100, 12.5, 1);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.leaves_qty, 0);
    }

    #[test]
    fn test_average_price_accumulates() {
        let mut order = working_order(100);
        order.apply_fill(50, 10.0, 1);
        order.apply_fill(50, 20.0, 2);
        assert!((order.avg_px - 15.0).abs() < 1e-9);
        assert_eq!(order.status, OrderStatus::Filled);
    }
}
