// Processor: event intake and transaction execution.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::book::{BookSet, OrderStorage};
use crate::common::{IdGenerator, TransactionId};
use crate::model::WideDataStorage;
use crate::persist::WriteBehind;
use crate::queues::{InEvent, IncomingQueues, OutEventSink, QueuedEvent};
use crate::sequencer::TransactionManager;
use crate::store::RecordDispatcher;
use crate::subscription::EventDispatcher;

use super::context::ExecutionContext;
use super::stats::ProcessorStats;
use super::transactions::{
    CancelTransaction, ChangeStateTransaction, EngineTransaction, NewOrderTransaction,
    OrderTransaction, ProcessTransaction, ReplaceTransaction, TimerTransaction,
};

/// Shared handle to the transaction manager specialized for engine work.
pub type EngineTransactionManager = TransactionManager<EngineTransaction>;

/// Builds transactions from inbound events and executes assigned ones.
///
/// Every worker owns a clone; all state is shared behind `Arc`s, so clones
/// are cheap and interchangeable.
#[derive(Clone)]
pub struct Processor {
    ids: Arc<IdGenerator>,
    wide: Arc<WideDataStorage>,
    orders: Arc<OrderStorage>,
    books: Arc<BookSet>,
    in_queues: Arc<IncomingQueues>,
    out: Arc<dyn OutEventSink>,
    dispatcher: Arc<EventDispatcher>,
    records: Arc<RecordDispatcher>,
    persistence: Option<Arc<WriteBehind>>,
    transactions: Arc<EngineTransactionManager>,
    stats: Arc<ProcessorStats>,
}

impl Processor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ids: Arc<IdGenerator>,
        wide: Arc<WideDataStorage>,
        orders: Arc<OrderStorage>,
        books: Arc<BookSet>,
        in_queues: Arc<IncomingQueues>,
        out: Arc<dyn OutEventSink>,
        dispatcher: Arc<EventDispatcher>,
        records: Arc<RecordDispatcher>,
        persistence: Option<Arc<WriteBehind>>,
        transactions: Arc<EngineTransactionManager>,
    ) -> Self {
        Self {
            ids,
            wide,
            orders,
            books,
            in_queues,
            out,
            dispatcher,
            records,
            persistence,
            transactions,
            stats: Arc::new(ProcessorStats::new()),
        }
    }

    pub fn transactions(&self) -> &Arc<EngineTransactionManager> {
        &self.transactions
    }

    pub fn stats(&self) -> &Arc<ProcessorStats> {
        &self.stats
    }

    /// Drains one inbound event into a sequenced transaction. Returns false
    /// when the queue was empty.
    pub fn process_one_event(&self) -> bool {
        let QueuedEvent { source, event } = match self.in_queues.pop_front() {
            Some(entry) => entry,
            None => return false,
        };
        trace!(%source, "building transaction from event");

        let body = match event {
            InEvent::NewOrder(ev) => {
                let mut order = ev.order;
                // The engine key must exist before sequencing so the
                // read/write set is complete. Sessions that pre-drew an id
                // from the generator keep it.
                if !order.order_id.is_valid() {
                    order.order_id = self.ids.next_id();
                }
                OrderTransaction::NewOrder(NewOrderTransaction {
                    source,
                    order: Some(order),
                })
            }
            InEvent::CancelOrder(ev) => OrderTransaction::Cancel(CancelTransaction {
                source,
                order_id: ev.order_id,
            }),
            InEvent::ReplaceOrder(ev) => OrderTransaction::Replace(ReplaceTransaction {
                source,
                order_id: ev.order_id,
                params: ev.params,
            }),
            InEvent::ChangeOrderState(ev) => {
                OrderTransaction::ChangeState(ChangeStateTransaction {
                    source,
                    order_id: ev.order_id,
                    status: ev.status,
                })
            }
            InEvent::Process(ev) => OrderTransaction::Process(ProcessTransaction {
                source,
                kind: ev.kind,
                order_id: ev.order_id,
            }),
            InEvent::Timer(ev) => OrderTransaction::Timer(TimerTransaction {
                source,
                order_id: ev.order_id,
            }),
        };

        self.stats.record_event_ingested();
        self.transactions.add(EngineTransaction::new(body));
        true
    }

    /// Executes one claimed transaction and unlinks it, cascade-promoting
    /// its children.
    pub fn execute_transaction(&self, id: TransactionId, mut transaction: EngineTransaction) {
        let ctx = ExecutionContext {
            ids: &self.ids,
            wide: &self.wide,
            orders: &self.orders,
            books: &self.books,
            out: self.out.as_ref(),
            dispatcher: &self.dispatcher,
            records: &self.records,
            persistence: self.persistence.as_deref(),
            stats: &self.stats,
        };
        let completed = transaction.execute(&ctx);
        debug_assert!(completed, "transaction body did not complete");
        self.stats.record_transaction_executed();
        debug!(transaction = %id, "transaction executed");
        self.transactions.remove(id);
    }

    /// Claims and executes the next ready transaction. Returns false when
    /// no root was claimable.
    pub fn execute_next(&self) -> bool {
        match self.transactions.claim_next() {
            Some((id, transaction)) => {
                self.execute_transaction(id, transaction);
                true
            }
            None => false,
        }
    }
}
