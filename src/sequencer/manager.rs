// Transaction manager: the mutex-wrapped sequencer facade.
//
// Assigns monotonic ids (inside the lock, immediately before graph insertion,
// which is what keeps the graph's acyclicity argument sound), owns the
// submitted transactions, and fires the ready-to-execute observer outside the
// lock whenever an operation put new nodes on the root frontier.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::common::{IdGenerator, TransactionId};

use super::graph::DependencyGraph;
use super::types::{ObjectSet, Sequenced, TransactionObserver};

/// Coordinates transaction ordering for one engine.
///
/// All graph access is serialized by one mutex; observer callbacks and
/// transaction execution happen outside it.
pub struct TransactionManager<T: Sequenced> {
    ids: Arc<IdGenerator>,
    graph: Mutex<DependencyGraph<T>>,
    observer: Mutex<Option<Arc<dyn TransactionObserver>>>,
    /// Signaled whenever the graph drains; backs `wait_until_empty`.
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl<T: Sequenced> TransactionManager<T> {
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self {
            ids,
            graph: Mutex::new(DependencyGraph::new()),
            observer: Mutex::new(None),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
        }
    }

    /// Attaches the single ready-to-execute observer. Attaching over an
    /// existing observer is a programming error.
    pub fn attach(&self, observer: Arc<dyn TransactionObserver>) {
        let mut slot = self.observer.lock();
        debug_assert!(slot.is_none(), "observer already attached");
        *slot = Some(observer);
    }

    pub fn detach(&self) -> Option<Arc<dyn TransactionObserver>> {
        self.observer.lock().take()
    }

    /// Takes ownership of a transaction, assigns its id and links it into
    /// the graph. The transaction must not carry a valid id yet.
    pub fn add(&self, mut transaction: T) {
        debug_assert!(
            !transaction.transaction_id().is_valid(),
            "transaction id must be unassigned"
        );

        let mut objects = ObjectSet::new();
        transaction.related_objects(&mut objects);

        let mut ready = 0u32;
        {
            let mut graph = self.graph.lock();
            // The id must be drawn under the lock right before the insert so
            // ids enter the graph in strictly increasing order.
            let id = self.ids.next_id();
            transaction.assign_transaction_id(id);
            let inserted = graph.add(id, transaction, &objects, &mut ready);
            debug_assert!(inserted, "duplicate transaction id {id}");
        }
        self.notify_ready(ready);
    }

    /// Unlinks an executed transaction, promoting children whose last
    /// dependency this was. Returns false if the id is unknown.
    pub fn remove(&self, id: TransactionId) -> bool {
        debug_assert!(id.is_valid());
        let mut ready = 0u32;
        let (removed, empty) = {
            let mut graph = self.graph.lock();
            let removed = graph.remove(id, &mut ready);
            (removed, graph.is_empty())
        };
        self.notify_ready(ready);
        if empty {
            let _guard = self.drain_lock.lock();
            self.drained.notify_all();
        }
        removed
    }

    /// Claims the next executable root after the shared cursor, moving the
    /// transaction out to the calling worker. The node keeps blocking its
    /// children until `remove`.
    pub fn claim_next(&self) -> Option<(TransactionId, T)> {
        self.graph.lock().claim_next()
    }

    /// Cursor position, if that transaction is still linked.
    pub fn current(&self) -> Option<TransactionId> {
        self.graph.lock().current()
    }

    pub fn is_current_valid(&self) -> bool {
        self.graph.lock().is_current_valid()
    }

    pub fn parent_transactions(&self, id: TransactionId) -> Option<BTreeSet<TransactionId>> {
        self.graph.lock().parents(id)
    }

    pub fn related_transactions(&self, id: TransactionId) -> Option<BTreeSet<TransactionId>> {
        self.graph.lock().children(id)
    }

    pub fn len(&self) -> usize {
        self.graph.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.lock().is_empty()
    }

    /// Blocks until every linked transaction has been removed or the timeout
    /// expires. Returns true when the graph drained.
    pub fn wait_until_empty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.drain_lock.lock();
        loop {
            if self.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return self.is_empty();
            }
            let _ = self.drained.wait_for(&mut guard, deadline - now);
        }
    }

    fn notify_ready(&self, ready: u32) {
        if ready == 0 {
            return;
        }
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_ready_to_execute();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::IdT;
    use crate::sequencer::types::{ObjectKind, ObjectRef};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal sequenced value: a name plus a scripted object set.
    struct ScriptedTransaction {
        id: TransactionId,
        objects: Vec<ObjectRef>,
        tag: u32,
    }

    impl ScriptedTransaction {
        fn touching(tag: u32, objects: &[u64]) -> Self {
            Self {
                id: TransactionId::default(),
                objects: objects
                    .iter()
                    .map(|&o| ObjectRef::new(ObjectKind::Order, IdT::new(o, 1)))
                    .collect(),
                tag,
            }
        }
    }

    impl Sequenced for ScriptedTransaction {
        fn transaction_id(&self) -> TransactionId {
            self.id
        }

        fn assign_transaction_id(&mut self, id: TransactionId) {
            debug_assert!(!self.id.is_valid());
            self.id = id;
        }

        fn related_objects(&self, out: &mut ObjectSet) {
            for object in &self.objects {
                out.push(*object);
            }
        }
    }

    struct CountingObserver(AtomicUsize);

    impl TransactionObserver for CountingObserver {
        fn on_ready_to_execute(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager() -> TransactionManager<ScriptedTransaction> {
        TransactionManager::new(Arc::new(IdGenerator::new(20260801)))
    }

    #[test]
    fn test_ids_are_assigned_in_submission_order() {
        let manager = manager();
        manager.add(ScriptedTransaction::touching(1, &[1]));
        manager.add(ScriptedTransaction::touching(2, &[2]));
        manager.add(ScriptedTransaction::touching(3, &[1]));

        let (a, ta) = manager.claim_next().unwrap();
        let (b, tb) = manager.claim_next().unwrap();
        assert!(a < b);
        assert_eq!((ta.tag, tb.tag), (1, 2));
        // Third conflicts with the first and is not yet a root.
        assert!(manager.claim_next().is_none());

        assert!(manager.remove(a));
        let (c, tc) = manager.claim_next().unwrap();
        assert_eq!(tc.tag, 3);
        assert!(b < c);
        assert!(manager.remove(b));
        assert!(manager.remove(c));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_observer_fires_on_new_roots_only() {
        let manager = manager();
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        manager.attach(observer.clone());

        manager.add(ScriptedTransaction::touching(1, &[7]));
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
        // Conflicting follow-up is not a root; no notification.
        manager.add(ScriptedTransaction::touching(2, &[7]));
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);

        let (id, _tx) = manager.claim_next().unwrap();
        manager.remove(id);
        assert_eq!(observer.0.load(Ordering::SeqCst), 2);

        assert!(manager.detach().is_some());
        assert!(manager.detach().is_none());
    }

    #[test]
    fn test_neighbor_queries() {
        let manager = manager();
        manager.add(ScriptedTransaction::touching(1, &[1]));
        manager.add(ScriptedTransaction::touching(2, &[1, 2]));

        let (first, _) = manager.claim_next().unwrap();
        let children = manager.related_transactions(first).unwrap();
        assert_eq!(children.len(), 1);
        let child = *children.iter().next().unwrap();
        assert_eq!(
            manager.parent_transactions(child).unwrap(),
            [first].into_iter().collect()
        );
    }

    #[test]
    fn test_overlapping_transactions_drain_in_submission_order_across_threads() {
        use std::thread;

        const CHAINS: u64 = 20;
        const PER_CHAIN: u32 = 25;

        let manager = Arc::new(manager());
        // CHAINS independent chains; within a chain every transaction
        // touches the same object, so chain order must be preserved no
        // matter which worker claims what.
        for step in 0..PER_CHAIN {
            for chain in 0..CHAINS {
                manager.add(ScriptedTransaction::touching(step, &[chain + 1]));
            }
        }

        let drained: Arc<Mutex<Vec<(u64, u32)>>> = Arc::new(Mutex::new(Vec::new()));
        thread::scope(|scope| {
            for _ in 0..4 {
                let manager = Arc::clone(&manager);
                let drained = Arc::clone(&drained);
                scope.spawn(move || loop {
                    match manager.claim_next() {
                        Some((id, tx)) => {
                            // The object id doubles as the chain tag.
                            drained.lock().push((tx.objects[0].key.id, tx.tag));
                            manager.remove(id);
                        }
                        None => {
                            if manager.is_empty() {
                                break;
                            }
                            thread::yield_now();
                        }
                    }
                });
            }
        });

        let drained = drained.lock();
        assert_eq!(drained.len(), (CHAINS * PER_CHAIN as u64) as usize);
        let mut last_step = vec![None::<u32>; CHAINS as usize + 1];
        for (chain, step) in drained.iter() {
            let slot = &mut last_step[*chain as usize];
            if let Some(previous) = slot {
                assert!(
                    *previous < *step,
                    "chain {chain} drained step {step} after {previous}"
                );
            }
            *slot = Some(*step);
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn test_wait_until_empty_times_out_then_succeeds() {
        let manager = manager();
        manager.add(ScriptedTransaction::touching(1, &[1]));
        assert!(!manager.wait_until_empty(Duration::from_millis(20)));

        let (id, _tx) = manager.claim_next().unwrap();
        manager.remove(id);
        assert!(manager.wait_until_empty(Duration::from_millis(20)));
    }
}
