// Outgoing event queues: the MPSC egress path.

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam::queue::SegQueue;
use tracing::{debug, trace};

use super::events::{OutEvent, OutEventSink, QueuedOutEvent, SessionWriter};

/// Lock-free queue of outbound events. Many executors push; the single
/// drainer pops and hands each element to the session writer. There is no
/// peek slot on this path.
pub struct OutgoingQueues {
    queue: SegQueue<QueuedOutEvent>,
    size: AtomicU32,
}

impl OutgoingQueues {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            size: AtomicU32::new(0),
        }
    }

    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn pop_front(&self) -> Option<QueuedOutEvent> {
        let taken = self.queue.pop();
        if taken.is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
        taken
    }

    /// Hands every queued element to `writer`; used by the drainer loop and
    /// by shutdown. Returns how many elements were delivered.
    pub fn drain_to(&self, writer: &dyn SessionWriter) -> usize {
        let mut delivered = 0;
        while let Some(entry) = self.pop_front() {
            writer.deliver(&entry.target, &entry.event);
            delivered += 1;
        }
        if delivered > 0 {
            debug!(delivered, "outgoing queue drained");
        }
        delivered
    }
}

impl OutEventSink for OutgoingQueues {
    fn push(&self, target: &str, event: OutEvent) {
        trace!(dest = target, "outgoing event enqueued");
        self.queue.push(QueuedOutEvent {
            target: target.to_string(),
            event,
        });
        self.size.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for OutgoingQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// Session writer that logs deliveries; stands in for real session plumbing.
pub struct LoggingSessionWriter;

impl SessionWriter for LoggingSessionWriter {
    fn deliver(&self, target: &str, event: &OutEvent) {
        match event {
            OutEvent::ExecReport(report) => debug!(
                dest = target,
                order = %report.order_id,
                status = ?report.order_status,
                "exec report delivered"
            ),
            OutEvent::CancelReject(reject) => debug!(
                dest = target,
                order = %reject.order_id,
                reason = %reject.reason,
                "cancel reject delivered"
            ),
            OutEvent::BusinessReject(reject) => debug!(
                dest = target,
                reference = %reject.ref_id,
                reason = %reject.reason,
                "business reject delivered"
            ),
        }
    }
}
