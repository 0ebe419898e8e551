// Inbound and outbound event variants.
//
// One tagged variant per direction; consumers dispatch with `match`.

use crate::common::IdT;
use crate::model::{ExecutionEntry, OrderEntry, OrderStatus, ReplaceParams};

/// Start of a new order lifecycle. The queue entry owns the order until a
/// consumer pops it.
#[derive(Debug)]
pub struct NewOrderEvent {
    pub order: Box<OrderEntry>,
}

/// Cancel request addressed by engine order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOrderEvent {
    pub order_id: IdT,
}

/// Cancel/replace request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaceOrderEvent {
    pub order_id: IdT,
    pub params: ReplaceParams,
}

/// Operator-initiated state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeOrderStateEvent {
    pub order_id: IdT,
    pub status: OrderStatus,
}

/// Internal gear shifts advancing pending order states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    OnReplaceReceived,
    OnOrderAccepted,
    OnExecReplace,
    OnReplaceRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEvent {
    pub kind: ProcessKind,
    pub order_id: IdT,
}

/// Timer firing, addressed at the order whose expiry it tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub order_id: IdT,
}

/// Every inbound event the engine ingests.
#[derive(Debug)]
pub enum InEvent {
    NewOrder(NewOrderEvent),
    CancelOrder(CancelOrderEvent),
    ReplaceOrder(ReplaceOrderEvent),
    ChangeOrderState(ChangeOrderStateEvent),
    Process(ProcessEvent),
    Timer(TimerEvent),
}

impl InEvent {
    /// The order id the event addresses, when it addresses one directly.
    pub fn order_id(&self) -> Option<IdT> {
        match self {
            InEvent::NewOrder(event) => Some(event.order.order_id),
            InEvent::CancelOrder(event) => Some(event.order_id),
            InEvent::ReplaceOrder(event) => Some(event.order_id),
            InEvent::ChangeOrderState(event) => Some(event.order_id),
            InEvent::Process(event) => Some(event.order_id),
            InEvent::Timer(event) => Some(event.order_id),
        }
    }
}

/// An inbound event tagged with the client source that produced it.
#[derive(Debug)]
pub struct QueuedEvent {
    pub source: String,
    pub event: InEvent,
}

/// Cancel or replace rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRejectEvent {
    pub order_id: IdT,
    pub reason: String,
}

/// Application-level rejection of any other stimulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessRejectEvent {
    pub ref_id: IdT,
    pub reason: String,
}

/// Every outbound event the engine emits.
#[derive(Debug, Clone, PartialEq)]
pub enum OutEvent {
    ExecReport(ExecutionEntry),
    CancelReject(CancelRejectEvent),
    BusinessReject(BusinessRejectEvent),
}

/// An outbound event tagged with its delivery target.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedOutEvent {
    pub target: String,
    pub event: OutEvent,
}

/// Push side of the incoming queues, shared with every client session and
/// with the processor's own gear-shift feedback.
pub trait InEventSink: Send + Sync {
    fn push(&self, source: &str, event: InEvent);
}

/// Notified after an element becomes visible in the incoming queues.
/// Coalescing across bursts is permitted.
pub trait InQueueObserver: Send + Sync {
    fn on_new_event(&self);
}

/// Push side of the outgoing queues.
pub trait OutEventSink: Send + Sync {
    fn push(&self, target: &str, event: OutEvent);
}

/// Downstream consumer the out-queue drainer hands events to.
pub trait SessionWriter: Send + Sync {
    fn deliver(&self, target: &str, event: &OutEvent);
}
