// Event Pipeline Benchmarks
// Drives the ingest-sequence-execute path single-threaded: crossing order
// pairs flow through the queues, the dependency graph and the matching book.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use matchgate::book::{BookSet, OrderStorage};
use matchgate::common::{IdGenerator, IdT};
use matchgate::model::{
    InstrumentEntry, OrderEntry, OrderStatus, OrderType, RawDataEntry, Side, TimeInForce,
    WideDataStorage,
};
use matchgate::process::{EngineTransactionManager, Processor};
use matchgate::queues::{InEvent, InEventSink, IncomingQueues, NewOrderEvent, OutgoingQueues};
use matchgate::store::{NullRecordSink, RecordDispatcher};
use matchgate::subscription::{EventDispatcher, SubscriptionLayer, SubscriptionManager};

struct Pipeline {
    processor: Processor,
    in_queues: Arc<IncomingQueues>,
    wide: Arc<WideDataStorage>,
    instrument: IdT,
}

fn pipeline() -> Pipeline {
    let ids = Arc::new(IdGenerator::new(20260801));
    let wide = Arc::new(WideDataStorage::new(Arc::clone(&ids)));
    let orders = Arc::new(OrderStorage::new());
    let books = Arc::new(BookSet::new());
    let in_queues = Arc::new(IncomingQueues::new());
    let out_queues = Arc::new(OutgoingQueues::new());
    let dispatcher = Arc::new(EventDispatcher::new(
        Arc::new(SubscriptionManager::new(Arc::clone(&wide))),
        Arc::new(SubscriptionLayer::new()),
    ));
    let records = Arc::new(RecordDispatcher::new(
        Arc::clone(&wide),
        Arc::clone(&books),
        Arc::clone(&orders),
        Arc::new(NullRecordSink),
    ));
    let transactions = Arc::new(EngineTransactionManager::new(Arc::clone(&ids)));

    let instrument = wide.add_instrument(InstrumentEntry {
        symbol: "BENCH".into(),
        ..Default::default()
    });
    books.add_instrument(instrument);

    let processor = Processor::new(
        ids,
        Arc::clone(&wide),
        orders,
        books,
        Arc::clone(&in_queues),
        out_queues,
        dispatcher,
        records,
        None,
        transactions,
    );
    Pipeline {
        processor,
        in_queues,
        wide,
        instrument,
    }
}

fn crossing_order(p: &Pipeline, tag: usize, side: Side) -> Box<OrderEntry> {
    let mut order = Box::new(OrderEntry::new(
        p.wide.add_string("CLNT"),
        p.wide.add_string("NASDAQ"),
        p.wide.add_raw_data(RawDataEntry::from_text(&format!("CL-{tag}"))),
        IdT::default(),
        p.instrument,
        IdT::default(),
        IdT::default(),
        p.wide.add_execution_list(Vec::new()),
    ));
    order.status = OrderStatus::ReceivedNew;
    order.side = side;
    order.ord_type = OrderType::Limit;
    order.tif = TimeInForce::Day;
    order.price = 1.46;
    order.order_qty = 100;
    order.leaves_qty = 100;
    order
}

fn bench_crossing_pairs(c: &mut Criterion) {
    const PAIRS: usize = 100;

    c.bench_function("ingest_and_execute_100_crossing_pairs", |b| {
        b.iter(|| {
            let p = pipeline();
            for i in 0..PAIRS {
                let buy = crossing_order(&p, i * 2, Side::Buy);
                let sell = crossing_order(&p, i * 2 + 1, Side::Sell);
                p.in_queues
                    .push("bench", InEvent::NewOrder(NewOrderEvent { order: buy }));
                p.in_queues
                    .push("bench", InEvent::NewOrder(NewOrderEvent { order: sell }));
            }
            while p.processor.process_one_event() {}
            while p.processor.execute_next() {}
            black_box(p.processor.stats().snapshot().transactions_executed);
        });
    });
}

criterion_group!(benches, bench_crossing_pairs);
criterion_main!(benches);
