// Engine runtime: the context bag built once by `main`.
//
// The id generator, stores, books, queues, subscription machinery, record
// log and write-behind pipeline are all created in one place and handed out
// as shared handles; no component reaches for process-global state.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::book::{BookSet, OrderStorage};
use crate::common::{IdGenerator, IdT, SubscriberId};
use crate::error::Result;
use crate::model::{AccountEntry, ClearingEntry, InstrumentEntry, WideDataStorage};
use crate::persist::{
    PostgresBackend, RequestBuilder, WriteBehind, WriteBehindCounters, WriteRequest,
};
use crate::process::{EngineTransactionManager, Processor, ProcessorCounters, ProcessorStats};
use crate::queues::{
    IncomingQueues, LoggingSessionWriter, OutEventSink, OutgoingQueues, QueuesManager,
    SessionWriter,
};
use crate::store::{NullRecordSink, RecordDispatcher, RecordLog, RecordSink};
use crate::subscription::{EventDispatcher, OrderFilter, SubscriptionLayer, SubscriptionManager};
use crate::tasks::{TaskManager, TaskManagerConfig};
use crate::EngineConfig;

/// A fully wired engine instance.
pub struct Runtime {
    config: EngineConfig,
    ids: Arc<IdGenerator>,
    wide: Arc<WideDataStorage>,
    orders: Arc<OrderStorage>,
    books: Arc<BookSet>,
    queues: QueuesManager,
    subscriptions: Arc<SubscriptionManager>,
    records: Arc<RecordDispatcher>,
    record_log: Option<Arc<RecordLog>>,
    persistence: Option<Arc<WriteBehind>>,
    processing: Arc<ProcessorStats>,
    tasks: Option<TaskManager>,
}

impl Runtime {
    /// Builds every component, replays the record log if one exists, and
    /// starts the worker pools.
    pub fn start(config: EngineConfig) -> Result<Self> {
        Self::start_with_writer(config, Arc::new(LoggingSessionWriter))
    }

    /// As `start`, with a caller-supplied session writer on the out-queue
    /// drainer.
    pub fn start_with_writer(
        config: EngineConfig,
        writer: Arc<dyn SessionWriter>,
    ) -> Result<Self> {
        let ids = Arc::new(IdGenerator::new(config.session_date));
        let wide = Arc::new(WideDataStorage::new(Arc::clone(&ids)));
        let orders = Arc::new(OrderStorage::new());
        let books = Arc::new(BookSet::new());
        let queues = QueuesManager::new();
        let in_queues = queues.incoming();
        let out_queues = queues.outgoing();
        let subscriptions = Arc::new(SubscriptionManager::new(Arc::clone(&wide)));
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&subscriptions),
            Arc::new(SubscriptionLayer::new()),
        ));

        let record_log = if config.enable_record_log {
            fs::create_dir_all(&config.data_dir)?;
            let path = std::path::Path::new(&config.data_dir).join(&config.record_log_file);
            Some(Arc::new(RecordLog::open(path)?))
        } else {
            None
        };
        let sink: Arc<dyn RecordSink> = match &record_log {
            Some(log) => Arc::clone(log) as Arc<dyn RecordSink>,
            None => Arc::new(NullRecordSink),
        };
        let records = Arc::new(RecordDispatcher::new(
            Arc::clone(&wide),
            Arc::clone(&books),
            Arc::clone(&orders),
            sink,
        ));

        // Recover state before any worker runs, then move the id sequence
        // past everything the log handed back.
        if let Some(log) = &record_log {
            let mut max_restored = 0u64;
            let stats = log.load(|id, record| {
                max_restored = max_restored.max(id.id);
                records.on_record_loaded(id, record)
            })?;
            ids.advance_past(max_restored);
            if stats.loaded > 0 || stats.skipped > 0 {
                info!(
                    loaded = stats.loaded,
                    skipped = stats.skipped,
                    "state recovered from record log"
                );
            }
        }

        let persistence = match &config.postgres_url {
            Some(url) => {
                let backend = Arc::new(PostgresBackend::new(url.clone())?);
                Some(Arc::new(WriteBehind::spawn(backend)))
            }
            None => {
                warn!("no postgres url configured; mirror writes disabled");
                None
            }
        };

        let transactions = Arc::new(EngineTransactionManager::new(Arc::clone(&ids)));
        let processor = Processor::new(
            Arc::clone(&ids),
            Arc::clone(&wide),
            Arc::clone(&orders),
            Arc::clone(&books),
            Arc::clone(&in_queues),
            Arc::clone(&out_queues) as Arc<dyn OutEventSink>,
            dispatcher,
            Arc::clone(&records),
            persistence.clone(),
            Arc::clone(&transactions),
        );
        let processing = Arc::clone(processor.stats());

        let tasks = TaskManager::start(
            TaskManagerConfig {
                event_workers: config.event_workers,
                transaction_workers: config.transaction_workers,
                ..Default::default()
            },
            &processor,
            Arc::clone(&in_queues),
            Arc::clone(&out_queues),
            transactions,
            writer,
        );

        info!(session_date = config.session_date, "engine runtime started");
        Ok(Self {
            config,
            ids,
            wide,
            orders,
            books,
            queues,
            subscriptions,
            records,
            record_log,
            persistence,
            processing,
            tasks: Some(tasks),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ingest handle for client sessions.
    pub fn in_queues(&self) -> Arc<IncomingQueues> {
        self.queues.incoming()
    }

    pub fn out_queues(&self) -> Arc<OutgoingQueues> {
        self.queues.outgoing()
    }

    pub fn orders(&self) -> Arc<OrderStorage> {
        Arc::clone(&self.orders)
    }

    pub fn wide(&self) -> Arc<WideDataStorage> {
        Arc::clone(&self.wide)
    }

    pub fn books(&self) -> Arc<BookSet> {
        Arc::clone(&self.books)
    }

    /// Lists a tradable instrument: wide store, book, durable record and
    /// mirror write.
    pub fn list_instrument(&self, value: InstrumentEntry) -> IdT {
        let request = WriteRequest::Instrument(RequestBuilder::from_instrument(&value));
        let id = self.wide.add_instrument(value);
        self.books.add_instrument(id);
        if let Some(instrument) = self.wide.instrument(id) {
            self.records.save_instrument(&instrument);
        }
        if let Some(persistence) = &self.persistence {
            persistence.enqueue(request);
        }
        info!(instrument = %id, "instrument listed");
        id
    }

    /// Registers an account, mirroring it durably.
    pub fn register_account(&self, value: AccountEntry) -> IdT {
        let request = WriteRequest::Account(RequestBuilder::from_account(&value));
        let id = self.wide.add_account(value);
        if let Some(account) = self.wide.account(id) {
            self.records.save_account(&account);
        }
        if let Some(persistence) = &self.persistence {
            persistence.enqueue(request);
        }
        id
    }

    /// Registers a clearing firm, mirroring it durably.
    pub fn register_clearing(&self, value: ClearingEntry) -> IdT {
        let request = WriteRequest::Clearing(RequestBuilder::from_clearing(&value));
        let id = self.wide.add_clearing(value);
        if let Some(clearing) = self.wide.clearing(id) {
            self.records.save_clearing(&clearing);
        }
        if let Some(persistence) = &self.persistence {
            persistence.enqueue(request);
        }
        id
    }

    pub fn add_subscription(
        &self,
        name: &str,
        filter: OrderFilter,
        handler: SubscriberId,
    ) -> IdT {
        self.subscriptions.add_subscription(name, filter, handler)
    }

    pub fn remove_subscriptions(&self, handler: SubscriberId) {
        self.subscriptions.remove_subscriptions(handler);
    }

    pub fn persistence_counters(&self) -> Option<WriteBehindCounters> {
        self.persistence.as_ref().map(|p| p.counters())
    }

    pub fn processing_counters(&self) -> ProcessorCounters {
        self.processing.snapshot()
    }

    pub fn record_log(&self) -> Option<&Arc<RecordLog>> {
        self.record_log.as_ref()
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    /// Blocks until ingested work drains or the timeout expires.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        match &self.tasks {
            Some(tasks) => tasks.wait_until_transactions_finished(timeout),
            None => true,
        }
    }

    /// Orderly shutdown: worker pools first, then the mirror writer.
    pub fn shutdown(mut self) {
        if let Some(mut tasks) = self.tasks.take() {
            tasks.shutdown();
        }
        if let Some(persistence) = &self.persistence {
            persistence.shutdown();
        }
        info!("engine runtime stopped");
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(mut tasks) = self.tasks.take() {
            tasks.shutdown();
        }
        if let Some(persistence) = &self.persistence {
            persistence.shutdown();
        }
    }
}
