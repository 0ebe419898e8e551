// Incoming event queues: the lock-free MPMC ingest path.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use tracing::trace;

use super::events::{InEvent, InEventSink, InQueueObserver, QueuedEvent};

/// Lock-free queue of tagged inbound events.
///
/// Producers push concurrently; consumers take whole `QueuedEvent`s and
/// dispatch by `match`. A small mutex guards the pending slot that backs the
/// peek (`top`) operation; the slot's element still counts toward `size`
/// until it is popped.
///
/// Ordering: FIFO per producer, no total order across producers. The
/// observer sees `on_new_event` at least once per push.
pub struct IncomingQueues {
    queue: SegQueue<QueuedEvent>,
    size: AtomicU32,
    pending: Mutex<Option<QueuedEvent>>,
    observer: Mutex<Option<Arc<dyn InQueueObserver>>>,
}

impl IncomingQueues {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            size: AtomicU32::new(0),
            pending: Mutex::new(None),
            observer: Mutex::new(None),
        }
    }

    /// Attaches the consumer-side observer, returning any previous one.
    pub fn attach(&self, observer: Arc<dyn InQueueObserver>) -> Option<Arc<dyn InQueueObserver>> {
        self.observer.lock().replace(observer)
    }

    pub fn detach(&self) -> Option<Arc<dyn InQueueObserver>> {
        self.observer.lock().take()
    }

    /// Lower bound of the element count (pushes minus pops); O(1).
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Peek: applies `f` to the head element without consuming it. Fills
    /// the pending slot from the queue when empty. Returns `None` iff the
    /// queue held nothing.
    pub fn peek_with<R>(&self, f: impl FnOnce(&QueuedEvent) -> R) -> Option<R> {
        let mut pending = self.pending.lock();
        if pending.is_none() {
            *pending = self.queue.pop();
        }
        pending.as_ref().map(f)
    }

    /// Drops one element: the pending slot if occupied, otherwise the queue
    /// head. Returns false when there was nothing to drop.
    pub fn pop(&self) -> bool {
        let mut pending = self.pending.lock();
        let dropped = pending.take().or_else(|| self.queue.pop());
        if dropped.is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    /// Takes one element with ownership, atomically with respect to other
    /// consumers of the pending slot: a peeked element is returned to the
    /// next `pop_front` caller, never to two.
    pub fn pop_front(&self) -> Option<QueuedEvent> {
        let taken = {
            let mut pending = self.pending.lock();
            pending.take().or_else(|| self.queue.pop())
        };
        if taken.is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
        taken
    }

    fn notify(&self) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_new_event();
        }
    }
}

impl InEventSink for IncomingQueues {
    fn push(&self, source: &str, event: InEvent) {
        trace!(source, "incoming event enqueued");
        self.queue.push(QueuedEvent {
            source: source.to_string(),
            event,
        });
        self.size.fetch_add(1, Ordering::AcqRel);
        self.notify();
    }
}

impl Default for IncomingQueues {
    fn default() -> Self {
        Self::new()
    }
}
