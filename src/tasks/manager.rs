// Task manager: event workers, transaction workers and the out-queue
// drainer.
//
// Event workers park on the in-queue's new-event signal and drain events in
// batches; transaction workers park on the sequencer's ready signal, then
// claim-execute-remove root transactions. Waits are timed, so a coalesced or
// lost wakeup costs one timeout, never a hang. Shutdown is cooperative:
// workers finish their current item and exit once their queues report empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::process::{EngineTransactionManager, Processor};
use crate::queues::{InQueueObserver, IncomingQueues, OutgoingQueues, SessionWriter};
use crate::sequencer::TransactionObserver;

/// Pool sizing; both pools default to the core count.
#[derive(Debug, Clone, Copy)]
pub struct TaskManagerConfig {
    pub event_workers: usize,
    pub transaction_workers: usize,
    /// Events drained per event-worker wake.
    pub event_batch: usize,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        let cores = num_cpus::get().max(1);
        Self {
            event_workers: cores,
            transaction_workers: cores,
            event_batch: 64,
        }
    }
}

/// Condvar-backed wake signal shared between observers and workers.
struct WakeSignal {
    lock: Mutex<()>,
    cv: Condvar,
}

impl WakeSignal {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    fn notify(&self) {
        let _guard = self.lock.lock();
        self.cv.notify_all();
    }

    fn wait_timeout(&self, timeout: Duration) {
        let mut guard = self.lock.lock();
        let _ = self.cv.wait_for(&mut guard, timeout);
    }
}

struct EventSignal(Arc<WakeSignal>);

impl InQueueObserver for EventSignal {
    fn on_new_event(&self) {
        self.0.notify();
    }
}

struct ReadySignal(Arc<WakeSignal>);

impl TransactionObserver for ReadySignal {
    fn on_ready_to_execute(&self) {
        self.0.notify();
    }
}

const PARK_TIMEOUT: Duration = Duration::from_millis(50);
const DRAIN_POLL: Duration = Duration::from_millis(1);

/// Owns every engine worker thread.
pub struct TaskManager {
    shutdown: Arc<AtomicBool>,
    event_signal: Arc<WakeSignal>,
    ready_signal: Arc<WakeSignal>,
    in_queues: Arc<IncomingQueues>,
    transactions: Arc<EngineTransactionManager>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskManager {
    /// Spawns the pools and wires the wake observers. One processor clone
    /// per worker.
    pub fn start(
        config: TaskManagerConfig,
        processor: &Processor,
        in_queues: Arc<IncomingQueues>,
        out_queues: Arc<OutgoingQueues>,
        transactions: Arc<EngineTransactionManager>,
        writer: Arc<dyn SessionWriter>,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let event_signal = Arc::new(WakeSignal::new());
        let ready_signal = Arc::new(WakeSignal::new());

        in_queues.attach(Arc::new(EventSignal(Arc::clone(&event_signal))));
        transactions.attach(Arc::new(ReadySignal(Arc::clone(&ready_signal))));

        let mut workers = Vec::new();

        for index in 0..config.event_workers.max(1) {
            let processor = processor.clone();
            let shutdown = Arc::clone(&shutdown);
            let signal = Arc::clone(&event_signal);
            let queues = Arc::clone(&in_queues);
            let batch = config.event_batch.max(1);
            workers.push(
                thread::Builder::new()
                    .name(format!("event-worker-{index}"))
                    .spawn(move || {
                        debug!("event worker started");
                        loop {
                            let mut drained = 0;
                            while drained < batch && processor.process_one_event() {
                                drained += 1;
                            }
                            if shutdown.load(Ordering::Acquire) && queues.is_empty() {
                                break;
                            }
                            if drained == 0 {
                                signal.wait_timeout(PARK_TIMEOUT);
                            }
                        }
                        debug!("event worker stopped");
                    })
                    .expect("spawn event worker"),
            );
        }

        for index in 0..config.transaction_workers.max(1) {
            let processor = processor.clone();
            let shutdown = Arc::clone(&shutdown);
            let signal = Arc::clone(&ready_signal);
            let queues = Arc::clone(&in_queues);
            let transactions = Arc::clone(&transactions);
            workers.push(
                thread::Builder::new()
                    .name(format!("transaction-worker-{index}"))
                    .spawn(move || {
                        debug!("transaction worker started");
                        loop {
                            if processor.execute_next() {
                                continue;
                            }
                            // Exit only when nothing can produce more work.
                            if shutdown.load(Ordering::Acquire)
                                && transactions.is_empty()
                                && queues.is_empty()
                            {
                                break;
                            }
                            signal.wait_timeout(PARK_TIMEOUT);
                        }
                        debug!("transaction worker stopped");
                    })
                    .expect("spawn transaction worker"),
            );
        }

        {
            let shutdown = Arc::clone(&shutdown);
            let queues = Arc::clone(&in_queues);
            let transactions = Arc::clone(&transactions);
            workers.push(
                thread::Builder::new()
                    .name("out-queue-drainer".into())
                    .spawn(move || {
                        debug!("out-queue drainer started");
                        loop {
                            let delivered = out_queues.drain_to(writer.as_ref());
                            if delivered == 0 {
                                if shutdown.load(Ordering::Acquire)
                                    && queues.is_empty()
                                    && transactions.is_empty()
                                    && out_queues.is_empty()
                                {
                                    break;
                                }
                                thread::sleep(DRAIN_POLL);
                            }
                        }
                        debug!("out-queue drainer stopped");
                    })
                    .expect("spawn out-queue drainer"),
            );
        }

        info!(
            event_workers = config.event_workers.max(1),
            transaction_workers = config.transaction_workers.max(1),
            "task manager started"
        );
        Self {
            shutdown,
            event_signal,
            ready_signal,
            in_queues,
            transactions,
            workers,
        }
    }

    /// Blocks until the ingest queue and the transaction graph drain, or
    /// the timeout expires. Returns true when everything drained.
    pub fn wait_until_transactions_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_queues.is_empty() && self.transactions.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return self.in_queues.is_empty() && self.transactions.is_empty();
            }
            thread::sleep(DRAIN_POLL);
        }
    }

    /// Cooperative shutdown: flags the workers, wakes them and joins.
    /// Already-ingested events complete before the pools exit.
    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.event_signal.notify();
        self.ready_signal.notify();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.in_queues.detach();
        self.transactions.detach();
        info!("task manager stopped");
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
