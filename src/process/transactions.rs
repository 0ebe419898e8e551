// Concrete transaction types built from inbound events.
//
// One enum instead of a class hierarchy; the sequencer sees it through the
// `Sequenced` trait, the executor through `execute`. Every body completes:
// precondition failures reduce to an outbound reject, never to an aborted
// worker, and the graph node is always left removable.

use tracing::{debug, warn};

use crate::common::{IdT, TransactionId};
use crate::model::{ExecType, OrderEntry, OrderStatus, OrderType, ReplaceParams, TimeInForce};
use crate::queues::ProcessKind;
use crate::sequencer::{ObjectKind, ObjectRef, ObjectSet, Sequenced};

use super::context::ExecutionContext;

/// A new-order lifecycle start. Owns the order until execution installs it
/// in the storage.
pub struct NewOrderTransaction {
    pub source: String,
    pub order: Option<Box<OrderEntry>>,
}

/// Cancel by engine order id.
pub struct CancelTransaction {
    pub source: String,
    pub order_id: IdT,
}

/// Cancel/replace: re-price and re-size in place.
pub struct ReplaceTransaction {
    pub source: String,
    pub order_id: IdT,
    pub params: ReplaceParams,
}

/// Operator-initiated state change.
pub struct ChangeStateTransaction {
    pub source: String,
    pub order_id: IdT,
    pub status: OrderStatus,
}

/// Internal gear shift advancing a pending state.
pub struct ProcessTransaction {
    pub source: String,
    pub kind: ProcessKind,
    pub order_id: IdT,
}

/// Timer firing: order expiry.
pub struct TimerTransaction {
    pub source: String,
    pub order_id: IdT,
}

/// Every unit of work the engine sequences and executes.
pub enum OrderTransaction {
    NewOrder(NewOrderTransaction),
    Cancel(CancelTransaction),
    Replace(ReplaceTransaction),
    ChangeState(ChangeStateTransaction),
    Process(ProcessTransaction),
    Timer(TimerTransaction),
}

/// Wrapper pairing the body with its manager-assigned id.
pub struct EngineTransaction {
    id: TransactionId,
    pub body: OrderTransaction,
}

impl EngineTransaction {
    pub fn new(body: OrderTransaction) -> Self {
        Self {
            id: TransactionId::default(),
            body,
        }
    }

    fn push_valid(out: &mut ObjectSet, kind: ObjectKind, key: IdT) {
        if key.is_valid() {
            out.push(ObjectRef::new(kind, key));
        }
    }

    /// Executes the body. The return value reports completion; bodies always
    /// complete (rejects included), so `false` never escapes a healthy
    /// engine.
    pub fn execute(&mut self, ctx: &ExecutionContext<'_>) -> bool {
        match &mut self.body {
            OrderTransaction::NewOrder(tx) => execute_new_order(tx, ctx),
            OrderTransaction::Cancel(tx) => execute_cancel(tx, ctx),
            OrderTransaction::Replace(tx) => execute_replace(tx, ctx),
            OrderTransaction::ChangeState(tx) => execute_change_state(tx, ctx),
            OrderTransaction::Process(tx) => execute_process(tx, ctx),
            OrderTransaction::Timer(tx) => execute_timer(tx, ctx),
        }
    }
}

impl Sequenced for EngineTransaction {
    fn transaction_id(&self) -> TransactionId {
        self.id
    }

    fn assign_transaction_id(&mut self, id: TransactionId) {
        debug_assert!(!self.id.is_valid(), "transaction id assigned twice");
        self.id = id;
    }

    fn related_objects(&self, out: &mut ObjectSet) {
        match &self.body {
            OrderTransaction::NewOrder(tx) => {
                if let Some(order) = &tx.order {
                    Self::push_valid(out, ObjectKind::Order, order.order_id);
                    Self::push_valid(out, ObjectKind::Instrument, order.instrument.id());
                    Self::push_valid(out, ObjectKind::Account, order.account.id());
                    Self::push_valid(out, ObjectKind::Clearing, order.clearing.id());
                    Self::push_valid(out, ObjectKind::ExecutionList, order.executions.id());
                }
            }
            OrderTransaction::Cancel(tx) => {
                Self::push_valid(out, ObjectKind::Order, tx.order_id);
            }
            OrderTransaction::Replace(tx) => {
                Self::push_valid(out, ObjectKind::Order, tx.order_id);
            }
            OrderTransaction::ChangeState(tx) => {
                Self::push_valid(out, ObjectKind::Order, tx.order_id);
            }
            OrderTransaction::Process(tx) => {
                Self::push_valid(out, ObjectKind::Order, tx.order_id);
            }
            OrderTransaction::Timer(tx) => {
                Self::push_valid(out, ObjectKind::Order, tx.order_id);
            }
        }
    }
}

fn execute_new_order(tx: &mut NewOrderTransaction, ctx: &ExecutionContext<'_>) -> bool {
    let mut order = match tx.order.take() {
        Some(order) => order,
        None => {
            warn!("new-order transaction executed twice");
            return true;
        }
    };
    let target = tx.source.as_str();
    let now = ctx.now();

    let book = match ctx.books.book(order.instrument_id()) {
        Some(book) => book,
        None => {
            ctx.business_reject(target, order.order_id, "unknown instrument");
            return true;
        }
    };

    // Accept: ReceivedNew -> New, full quantity open.
    order.status = OrderStatus::New;
    order.leaves_qty = order.order_qty;
    if order.creation_time == 0 {
        order.creation_time = now;
    }
    order.last_update_time = now;

    // The storage insert reserves the client order id; a duplicate loses
    // here even when the competing order ran on another worker.
    let cl_key = order.cl_order_id.get(ctx.wide).map(|raw| raw.data.clone());
    if !ctx.orders.insert(cl_key, (*order).clone()) {
        ctx.business_reject(target, order.order_id, "duplicate client order id");
        return true;
    }

    let fills = {
        let mut book = book.lock();

        // Fill-or-kill is decided before the first fill: either the book
        // can satisfy the whole quantity or nothing trades.
        if order.tif == TimeInForce::Fok {
            let available =
                book.crossable_quantity(order.side, order.ord_type, order.price, ctx.orders);
            if available < order.order_qty as u64 {
                order.status = OrderStatus::Canceled;
                order.leaves_qty = 0;
                drop(book);
                ctx.orders.update(order.order_id, |stored| *stored = (*order).clone());
                ctx.exec_report(target, &order, ExecType::Cancel, 0, 0.0, IdT::default());
                ctx.publish_order(&order);
                return true;
            }
        }

        let fills = book.match_incoming(&mut order, ctx.orders, now);
        if order.leaves_qty > 0 {
            let can_rest =
                order.ord_type != OrderType::Market && order.tif != TimeInForce::Ioc;
            if can_rest {
                book.insert(order.side, order.price, order.order_id);
            } else {
                // Market and immediate-or-cancel remainders cannot rest.
                order.status = OrderStatus::Canceled;
                order.leaves_qty = 0;
            }
        }
        fills
    };

    // Publish the taker's final state over the copy stored before matching.
    ctx.orders.update(order.order_id, |stored| *stored = (*order).clone());

    if fills.is_empty() {
        match order.status {
            OrderStatus::Canceled => {
                ctx.exec_report(target, &order, ExecType::Cancel, 0, 0.0, IdT::default())
            }
            _ => ctx.exec_report(target, &order, ExecType::New, 0, 0.0, IdT::default()),
        }
    } else {
        for fill in &fills {
            ctx.exec_report(
                target,
                &order,
                ExecType::Trade,
                fill.quantity,
                fill.price,
                fill.maker_order_id,
            );
        }
    }

    // Counterparties changed too: re-publish them without reports of their
    // own.
    for fill in &fills {
        if let Some(maker) = ctx.orders.get(fill.maker_order_id) {
            ctx.publish_order(&maker);
        }
    }
    ctx.publish_order(&order);
    true
}

fn execute_cancel(tx: &CancelTransaction, ctx: &ExecutionContext<'_>) -> bool {
    let target = tx.source.as_str();
    let order = match ctx.orders.get(tx.order_id) {
        Some(order) => order,
        None => {
            ctx.cancel_reject(target, tx.order_id, "unknown order");
            return true;
        }
    };
    if order.status.is_terminal() {
        ctx.cancel_reject(target, tx.order_id, "order is not open");
        return true;
    }

    unbook(ctx, &order);
    let now = ctx.now();
    let updated = ctx.orders.update(tx.order_id, |stored| {
        stored.status = OrderStatus::Canceled;
        stored.leaves_qty = 0;
        stored.last_update_time = now;
        stored.clone()
    });
    if let Some(updated) = updated {
        ctx.exec_report(target, &updated, ExecType::Cancel, 0, 0.0, IdT::default());
        ctx.publish_order(&updated);
    }
    true
}

fn execute_replace(tx: &ReplaceTransaction, ctx: &ExecutionContext<'_>) -> bool {
    let target = tx.source.as_str();
    let order = match ctx.orders.get(tx.order_id) {
        Some(order) => order,
        None => {
            ctx.cancel_reject(target, tx.order_id, "unknown order");
            return true;
        }
    };
    if order.status.is_terminal() {
        ctx.cancel_reject(target, tx.order_id, "order is not open");
        return true;
    }

    // Take the order off the book, amend, re-book any remainder.
    unbook(ctx, &order);
    let now = ctx.now();
    let params: ReplaceParams = tx.params;
    let updated = ctx.orders.update(tx.order_id, |stored| {
        if let Some(price) = params.price {
            stored.price = price;
        }
        if let Some(stop_px) = params.stop_px {
            stored.stop_px = stop_px;
        }
        if let Some(tif) = params.tif {
            stored.tif = tif;
        }
        if let Some(order_qty) = params.order_qty {
            stored.order_qty = order_qty;
            stored.leaves_qty = order_qty.saturating_sub(stored.cum_qty);
            if stored.leaves_qty == 0 {
                // Re-sized at or below what already traded.
                stored.status = if stored.cum_qty > 0 {
                    OrderStatus::Filled
                } else {
                    OrderStatus::Canceled
                };
            }
        }
        stored.last_update_time = now;
        stored.clone()
    });

    if let Some(updated) = updated {
        // Only a live remainder goes back on the book; a parked order keeps
        // its new terms without becoming matchable.
        if updated.leaves_qty > 0
            && matches!(updated.status, OrderStatus::New | OrderStatus::PartFill)
        {
            if let Some(book) = ctx.books.book(updated.instrument_id()) {
                book.lock()
                    .insert(updated.side, updated.price, updated.order_id);
            }
        }
        ctx.exec_report(target, &updated, ExecType::Replace, 0, 0.0, IdT::default());
        ctx.publish_order(&updated);
    }
    true
}

fn execute_change_state(tx: &ChangeStateTransaction, ctx: &ExecutionContext<'_>) -> bool {
    let target = tx.source.as_str();
    let order = match ctx.orders.get(tx.order_id) {
        Some(order) => order,
        None => {
            ctx.business_reject(target, tx.order_id, "unknown order");
            return true;
        }
    };
    if !order.status.operator_change_allowed(tx.status) {
        ctx.business_reject(target, tx.order_id, "illegal state change");
        return true;
    }

    let was_parked = matches!(
        order.status,
        OrderStatus::Suspended | OrderStatus::DoneForDay
    );
    let parks_or_closes = matches!(
        tx.status,
        OrderStatus::Suspended
            | OrderStatus::DoneForDay
            | OrderStatus::Canceled
            | OrderStatus::Expired
    );
    if parks_or_closes {
        unbook(ctx, &order);
    }
    let now = ctx.now();
    let status = tx.status;
    let updated = ctx.orders.update(tx.order_id, |stored| {
        stored.status = status;
        if status == OrderStatus::Canceled || status == OrderStatus::Expired {
            stored.leaves_qty = 0;
        }
        stored.last_update_time = now;
        stored.clone()
    });
    if let Some(updated) = updated {
        // Resuming a parked order puts its remainder back on the book;
        // a working order stays booked through the change.
        if tx.status == OrderStatus::New && was_parked && updated.leaves_qty > 0 {
            if let Some(book) = ctx.books.book(updated.instrument_id()) {
                book.lock()
                    .insert(updated.side, updated.price, updated.order_id);
            }
        }
        ctx.exec_report(target, &updated, ExecType::Status, 0, 0.0, IdT::default());
        ctx.publish_order(&updated);
    }
    true
}

fn execute_process(tx: &ProcessTransaction, ctx: &ExecutionContext<'_>) -> bool {
    let target = tx.source.as_str();
    let order = match ctx.orders.get(tx.order_id) {
        Some(order) => order,
        None => {
            ctx.business_reject(target, tx.order_id, "unknown order");
            return true;
        }
    };
    let now = ctx.now();

    let shift = |from_ok: bool, to: OrderStatus| -> Option<OrderEntry> {
        if !from_ok {
            debug!(order = %tx.order_id, kind = ?tx.kind, status = ?order.status,
                   "gear shift ignored in current state");
            return None;
        }
        ctx.orders.update(tx.order_id, |stored| {
            stored.status = to;
            stored.last_update_time = now;
            stored.clone()
        })
    };

    match tx.kind {
        ProcessKind::OnOrderAccepted => {
            if let Some(updated) = shift(order.status == OrderStatus::PendingNew, OrderStatus::New)
            {
                ctx.publish_order(&updated);
            }
        }
        ProcessKind::OnReplaceReceived => {
            if let Some(updated) = shift(order.status.is_working(), OrderStatus::PendingReplace) {
                ctx.publish_order(&updated);
            }
        }
        ProcessKind::OnExecReplace => {
            let resumed = if order.cum_qty > 0 {
                OrderStatus::PartFill
            } else {
                OrderStatus::New
            };
            if let Some(updated) = shift(order.status == OrderStatus::PendingReplace, resumed) {
                ctx.exec_report(target, &updated, ExecType::Replace, 0, 0.0, IdT::default());
                ctx.publish_order(&updated);
            }
        }
        ProcessKind::OnReplaceRejected => {
            let resumed = if order.cum_qty > 0 {
                OrderStatus::PartFill
            } else {
                OrderStatus::New
            };
            if let Some(updated) = shift(order.status == OrderStatus::PendingReplace, resumed) {
                ctx.cancel_reject(target, tx.order_id, "replace rejected");
                ctx.publish_order(&updated);
            }
        }
    }
    true
}

fn execute_timer(tx: &TimerTransaction, ctx: &ExecutionContext<'_>) -> bool {
    let target = tx.source.as_str();
    let order = match ctx.orders.get(tx.order_id) {
        Some(order) => order,
        None => {
            debug!(order = %tx.order_id, "timer fired for unknown order");
            return true;
        }
    };
    if order.status.is_terminal() {
        debug!(order = %tx.order_id, "timer fired for closed order");
        return true;
    }

    unbook(ctx, &order);
    let now = ctx.now();
    let updated = ctx.orders.update(tx.order_id, |stored| {
        stored.status = OrderStatus::Expired;
        stored.leaves_qty = 0;
        stored.last_update_time = now;
        stored.clone()
    });
    if let Some(updated) = updated {
        ctx.exec_report(target, &updated, ExecType::Expired, 0, 0.0, IdT::default());
        ctx.publish_order(&updated);
    }
    true
}

/// Removes a resting order from its book, if it is booked at all.
fn unbook(ctx: &ExecutionContext<'_>, order: &OrderEntry) {
    if let Some(book) = ctx.books.book(order.instrument_id()) {
        book.lock().remove(order.side, order.price, order.order_id);
    }
}
