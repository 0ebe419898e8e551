// Execution context: everything a transaction body touches while it runs.

use crate::book::{BookSet, OrderStorage};
use crate::common::{unix_now, DateTime, IdGenerator, IdT, Price, Quantity};
use crate::model::{ExecType, ExecutionEntry, ExecutionRef, OrderEntry, WideDataStorage};
use crate::persist::{RequestBuilder, WriteBehind, WriteRequest};
use crate::queues::{
    BusinessRejectEvent, CancelRejectEvent, OutEvent, OutEventSink,
};
use crate::store::RecordDispatcher;
use crate::subscription::EventDispatcher;

use super::stats::ProcessorStats;

/// Borrowed view over the engine collaborators, handed to each executing
/// transaction. Construction is cheap; one context lives for one execution.
pub struct ExecutionContext<'a> {
    pub ids: &'a IdGenerator,
    pub wide: &'a WideDataStorage,
    pub orders: &'a OrderStorage,
    pub books: &'a BookSet,
    pub out: &'a dyn OutEventSink,
    pub dispatcher: &'a EventDispatcher,
    pub records: &'a RecordDispatcher,
    pub persistence: Option<&'a WriteBehind>,
    pub stats: &'a ProcessorStats,
}

impl<'a> ExecutionContext<'a> {
    pub fn now(&self) -> DateTime {
        unix_now()
    }

    /// Emits an execution report for `order`, recording the execution in
    /// the order's history list.
    pub fn exec_report(
        &self,
        target: &str,
        order: &OrderEntry,
        exec_type: ExecType,
        last_qty: Quantity,
        last_px: Price,
        contra_order_id: IdT,
    ) {
        let exec_id = self.ids.next_id();
        if order.executions.is_set() {
            self.wide
                .append_execution(order.executions.id(), ExecutionRef { event_id: exec_id });
        }
        self.stats.record_exec_report();
        self.out.push(
            target,
            OutEvent::ExecReport(ExecutionEntry {
                exec_id,
                order_id: order.order_id,
                exec_type,
                order_status: order.status,
                last_qty,
                last_px,
                leaves_qty: order.leaves_qty,
                cum_qty: order.cum_qty,
                avg_px: order.avg_px,
                transact_time: self.now(),
                contra_order_id,
            }),
        );
    }

    pub fn cancel_reject(&self, target: &str, order_id: IdT, reason: &str) {
        self.stats.record_cancel_reject();
        self.out.push(
            target,
            OutEvent::CancelReject(CancelRejectEvent {
                order_id,
                reason: reason.to_string(),
            }),
        );
    }

    pub fn business_reject(&self, target: &str, ref_id: IdT, reason: &str) {
        self.stats.record_business_reject();
        self.out.push(
            target,
            OutEvent::BusinessReject(BusinessRejectEvent {
                ref_id,
                reason: reason.to_string(),
            }),
        );
    }

    /// Post-mutation fan-out for one order: durable record, mirror write,
    /// subscriber dispatch.
    pub fn publish_order(&self, order: &OrderEntry) {
        self.records.save_order(order);
        if let Some(persistence) = self.persistence {
            persistence.enqueue(WriteRequest::Order(RequestBuilder::from_order(
                order, self.wide,
            )));
        }
        self.dispatcher.dispatch_order(order);
    }
}
