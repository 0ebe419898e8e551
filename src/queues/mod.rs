// Event queues: inbound MPMC ingest and outbound MPSC egress.

pub mod events;
pub mod incoming;
pub mod outgoing;

pub use events::{
    BusinessRejectEvent, CancelOrderEvent, CancelRejectEvent, ChangeOrderStateEvent, InEvent,
    InEventSink, InQueueObserver, NewOrderEvent, OutEvent, OutEventSink, ProcessEvent,
    ProcessKind, QueuedEvent, QueuedOutEvent, ReplaceOrderEvent, SessionWriter, TimerEvent,
};
pub use incoming::IncomingQueues;
pub use outgoing::{LoggingSessionWriter, OutgoingQueues};

use std::sync::Arc;

/// Owner of both queue directions; hands shared handles to the rest of the
/// engine.
pub struct QueuesManager {
    incoming: Arc<IncomingQueues>,
    outgoing: Arc<OutgoingQueues>,
}

impl QueuesManager {
    pub fn new() -> Self {
        Self {
            incoming: Arc::new(IncomingQueues::new()),
            outgoing: Arc::new(OutgoingQueues::new()),
        }
    }

    pub fn incoming(&self) -> Arc<IncomingQueues> {
        Arc::clone(&self.incoming)
    }

    pub fn outgoing(&self) -> Arc<OutgoingQueues> {
        Arc::clone(&self.outgoing)
    }
}

impl Default for QueuesManager {
    fn default() -> Self {
        Self::new()
    }
}
