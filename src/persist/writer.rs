// Write-behind worker: the background mirror writer.
//
// State machine: Connecting (retry with doubling backoff) -> Running (one
// request per short transaction). A broken connection re-enqueues the
// in-flight request at the tail and goes back to Connecting; statement
// errors on a live connection drop the request and count. Shutdown drains
// the queue, attempting one reconnect if the connection is down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::queue::SegQueue;
use tracing::{error, info, warn};

use super::request::WriteRequest;
use super::store::{MirrorBackend, MirrorConnection, StoreError};

/// Tuning knobs; defaults match the production backoff envelope.
#[derive(Debug, Clone, Copy)]
pub struct WriteBehindConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub idle_sleep: Duration,
}

impl Default for WriteBehindConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            idle_sleep: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    enqueued: AtomicU64,
    written: AtomicU64,
    errors: AtomicU64,
}

/// Snapshot of the worker counters. `in_flight` is derived: requests
/// accepted but neither written nor failed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBehindCounters {
    pub enqueued: u64,
    pub written: u64,
    pub errors: u64,
    pub in_flight: u64,
}

/// Handle to the write-behind pipeline: the queue, the counters and the
/// worker thread. Dropping the handle shuts the worker down and drains.
pub struct WriteBehind {
    queue: Arc<SegQueue<WriteRequest>>,
    stats: Arc<Stats>,
    shutdown: Arc<AtomicBool>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl WriteBehind {
    pub fn spawn(backend: Arc<dyn MirrorBackend>) -> Self {
        Self::spawn_with_config(backend, WriteBehindConfig::default())
    }

    pub fn spawn_with_config(backend: Arc<dyn MirrorBackend>, config: WriteBehindConfig) -> Self {
        let queue = Arc::new(SegQueue::new());
        let stats = Arc::new(Stats::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = {
            let queue = Arc::clone(&queue);
            let stats = Arc::clone(&stats);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("persist-writer".into())
                .spawn(move || run(backend, config, queue, stats, shutdown))
                .expect("spawn persist writer thread")
        };

        Self {
            queue,
            stats,
            shutdown,
            worker: parking_lot::Mutex::new(Some(worker)),
        }
    }

    pub fn enqueue(&self, request: WriteRequest) {
        self.queue.push(request);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> WriteBehindCounters {
        let enqueued = self.stats.enqueued.load(Ordering::Relaxed);
        let written = self.stats.written.load(Ordering::Relaxed);
        let errors = self.stats.errors.load(Ordering::Relaxed);
        WriteBehindCounters {
            enqueued,
            written,
            errors,
            in_flight: enqueued.saturating_sub(written + errors),
        }
    }

    /// Stops the worker after it drains the queue. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

impl Drop for WriteBehind {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    backend: Arc<dyn MirrorBackend>,
    config: WriteBehindConfig,
    queue: Arc<SegQueue<WriteRequest>>,
    stats: Arc<Stats>,
    shutdown: Arc<AtomicBool>,
) {
    let mut backoff = config.initial_backoff;
    let mut conn: Option<Box<dyn MirrorConnection>> = None;

    let mut try_connect = |backoff: &mut Duration| -> Option<Box<dyn MirrorConnection>> {
        match backend.connect() {
            Ok(conn) => {
                *backoff = config.initial_backoff;
                Some(conn)
            }
            Err(err) => {
                error!(%err, "mirror connection failed");
                None
            }
        }
    };

    conn = try_connect(&mut backoff);

    loop {
        match queue.pop() {
            Some(request) => {
                if conn.is_none() {
                    conn = try_connect(&mut backoff);
                    if conn.is_none() {
                        queue.push(request);
                        interruptible_sleep(backoff, &shutdown);
                        backoff = (backoff * 2).min(config.max_backoff);
                        continue;
                    }
                }

                if let Err(reason) = request.validate() {
                    error!(%reason, "unwritable request dropped");
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                let outcome = match conn.as_mut() {
                    Some(open) => open.write(&request),
                    None => Err(StoreError::Transient("no connection".into())),
                };
                match outcome {
                    Ok(()) => {
                        stats.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(StoreError::Transient(reason)) => {
                        warn!(%reason, "mirror connection lost; request re-enqueued");
                        conn = None;
                        queue.push(request);
                        interruptible_sleep(backoff, &shutdown);
                        backoff = (backoff * 2).min(config.max_backoff);
                    }
                    Err(StoreError::Permanent(reason)) => {
                        error!(%reason, "mirror write failed; request dropped");
                        stats.errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            None => {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                thread::sleep(config.idle_sleep);
            }
        }
    }

    // Drain whatever is left, reconnecting once if needed.
    while let Some(request) = queue.pop() {
        if conn.is_none() {
            conn = try_connect(&mut backoff);
            if conn.is_none() {
                let abandoned = 1 + queue.len() as u64;
                stats.errors.fetch_add(abandoned, Ordering::Relaxed);
                error!(abandoned, "mirror unreachable at shutdown; queue abandoned");
                break;
            }
        }
        if let Err(reason) = request.validate() {
            error!(%reason, "unwritable request dropped during drain");
            stats.errors.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        let outcome = match conn.as_mut() {
            Some(open) => open.write(&request),
            None => Err(StoreError::Transient("no connection".into())),
        };
        match outcome {
            Ok(()) => {
                stats.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                error!(%err, "mirror write failed during drain; request dropped");
                stats.errors.fetch_add(1, Ordering::Relaxed);
                if matches!(err, StoreError::Transient(_)) {
                    conn = None;
                }
            }
        }
    }

    info!(
        written = stats.written.load(Ordering::Relaxed),
        errors = stats.errors.load(Ordering::Relaxed),
        "write-behind worker stopped"
    );
}

/// Sleeps in slices so shutdown does not wait out a full backoff.
fn interruptible_sleep(total: Duration, shutdown: &AtomicBool) {
    let slice = Duration::from_millis(10);
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::Acquire) {
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}
