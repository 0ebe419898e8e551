// Dependency Graph Performance Benchmarks
// Measures insertion, frontier drain and mixed add/claim churn over
// transactions with overlapping object sets.

use criterion::{criterion_group, criterion_main, Criterion};
use matchgate::common::IdT;
use std::hint::black_box;
use matchgate::sequencer::{DependencyGraph, ObjectKind, ObjectRef, ObjectSet};
use rand::Rng;
use std::collections::BTreeSet;

const TRANSACTIONS: u64 = 1_000;
const UNIVERSE: u64 = 50;
const USED_OBJECTS: usize = 3;

fn random_dep_sets() -> Vec<ObjectSet> {
    let mut rng = rand::rng();
    (0..TRANSACTIONS)
        .map(|_| {
            let mut objects = BTreeSet::new();
            while objects.len() < USED_OBJECTS {
                objects.insert(rng.random_range(1..=UNIVERSE));
            }
            let mut set = ObjectSet::new();
            for object in objects {
                set.push(ObjectRef::new(ObjectKind::Order, IdT::new(object, 1)));
            }
            set
        })
        .collect()
}

fn bench_insert_then_drain(c: &mut Criterion) {
    let dep_sets = random_dep_sets();

    c.bench_function("insert_then_drain_1000", |b| {
        b.iter(|| {
            let mut graph = DependencyGraph::new();
            let mut ready = 0u32;
            for (i, deps) in dep_sets.iter().enumerate() {
                graph.add(IdT::new(i as u64 + 1, 1), (), deps, &mut ready);
            }
            let mut drained = 0u64;
            while let Some((key, ())) = graph.claim_next() {
                graph.remove(key, &mut ready);
                drained += 1;
            }
            assert_eq!(drained, TRANSACTIONS);
            black_box(ready);
        });
    });
}

fn bench_mixed_churn(c: &mut Criterion) {
    let dep_sets = random_dep_sets();

    c.bench_function("mixed_add_claim_churn", |b| {
        b.iter(|| {
            let mut graph = DependencyGraph::new();
            let mut ready = 0u32;
            let seed = (TRANSACTIONS / 20) as usize;
            let mut next = 0usize;
            while next < seed {
                graph.add(IdT::new(next as u64 + 1, 1), (), &dep_sets[next], &mut ready);
                next += 1;
            }
            loop {
                if next < dep_sets.len() && next % 2 == 0 {
                    graph.add(IdT::new(next as u64 + 1, 1), (), &dep_sets[next], &mut ready);
                    next += 1;
                } else if let Some((key, ())) = graph.claim_next() {
                    graph.remove(key, &mut ready);
                } else if next < dep_sets.len() {
                    graph.add(IdT::new(next as u64 + 1, 1), (), &dep_sets[next], &mut ready);
                    next += 1;
                } else {
                    break;
                }
            }
            black_box(graph.len());
        });
    });
}

criterion_group!(benches, bench_insert_then_drain, bench_mixed_churn);
criterion_main!(benches);
