use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modular_di::*;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let scope = Scope::root("bench");
    scope.add_singleton(|_| Ok(42u64)).unwrap();
    scope.commit().unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = scope.get::<u64>().unwrap();
            black_box(v);
        })
    });
}

fn bench_lazy_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("lazy_singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let scope = Scope::root("bench");
                scope
                    .add_lazy_singleton(|_| {
                        Ok(ExpensiveToCreate {
                            data: (0..1000).collect(),
                        })
                    })
                    .unwrap();
                scope.commit().unwrap();
                scope
            },
            |scope| {
                let v = scope.get::<ExpensiveToCreate>().unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_cached_vs_factory(c: &mut Criterion) {
    struct Service {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("cached_vs_factory");

    let cached = Scope::root("cached");
    cached.add_lazy_singleton(|_| Ok(Service { data: [0; 64] })).unwrap();
    cached.commit().unwrap();

    group.bench_function("lazy_singleton", |b| {
        b.iter(|| {
            let v = cached.get::<Service>().unwrap();
            black_box(v.data[0]);
        })
    });

    let factory = Scope::root("factory");
    factory.add_factory(|_| Ok(Service { data: [0; 64] })).unwrap();
    factory.commit().unwrap();

    group.bench_function("factory", |b| {
        b.iter(|| {
            let v = factory.get::<Service>().unwrap();
            black_box(v.data[0]);
        })
    });

    group.finish();
}

fn bench_parent_chain_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("parent_chain");

    for depth in [1usize, 4, 16] {
        let root = Scope::root("root");
        root.add_instance(7u32).unwrap();
        root.commit().unwrap();

        let mut chain = vec![root];
        for level in 0..depth {
            let child = chain[level].child(format!("level-{}", level));
            child.commit().unwrap();
            chain.push(child);
        }

        group.bench_with_input(BenchmarkId::from_parameter(depth), &chain, |b, chain| {
            let leaf = &chain[chain.len() - 1];
            b.iter(|| {
                let v = leaf.get::<u32>().unwrap();
                black_box(*v);
            })
        });
    }

    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_chain");

    // Non-circular chain of depth 8
    struct Service1;
    struct Service2 { _s1: Arc<Service1> }
    struct Service3 { _s2: Arc<Service2> }
    struct Service4 { _s3: Arc<Service3> }
    struct Service5 { _s4: Arc<Service4> }
    struct Service6 { _s5: Arc<Service5> }
    struct Service7 { _s6: Arc<Service6> }
    struct Service8 { _s7: Arc<Service7> }

    let scope = Scope::root("bench");
    scope.add_factory(|_| Ok(Service1)).unwrap();
    scope.add_factory(|r| Ok(Service2 { _s1: r.get()? })).unwrap();
    scope.add_factory(|r| Ok(Service3 { _s2: r.get()? })).unwrap();
    scope.add_factory(|r| Ok(Service4 { _s3: r.get()? })).unwrap();
    scope.add_factory(|r| Ok(Service5 { _s4: r.get()? })).unwrap();
    scope.add_factory(|r| Ok(Service6 { _s5: r.get()? })).unwrap();
    scope.add_factory(|r| Ok(Service7 { _s6: r.get()? })).unwrap();
    scope.add_factory(|r| Ok(Service8 { _s7: r.get()? })).unwrap();
    scope.commit().unwrap();

    group.bench_function("factory_chain_depth_8", |b| {
        b.iter(|| {
            let service = scope.get::<Service8>().unwrap();
            black_box(&service);
        })
    });

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    struct Model {
        changed: Notifier,
    }

    let scope = Scope::root("bench");
    scope
        .register(Bind::singleton(|_| Ok(Model { changed: Notifier::new() })).notifier(|m: &Model| &m.changed))
        .unwrap();
    scope.commit().unwrap();

    let consumers: Vec<Consumer> = (0..32).map(|_| Consumer::new(|key: &Key| { black_box(key); })).collect();
    let mut model = None;
    for consumer in &consumers {
        model = Some(scope.watch::<Model>(consumer).unwrap());
    }
    let Some(model) = model else {
        return;
    };

    c.bench_function("notify_and_tick_32_consumers", |b| {
        b.iter(|| {
            model.changed.notify();
            black_box(scope.tick());
        })
    });
}

// ===== Macro Benchmarks =====

fn bench_generation_cycle(c: &mut Criterion) {
    struct Connection;
    impl Dispose for Connection {
        fn dispose(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    let mut manager = ScopeManager::new(|scope: &Scope| -> DiResult<()> {
        scope.register(Bind::singleton(|_| Ok(Connection)).disposable())?;
        scope.add_lazy_singleton(|_| Ok(vec![0u8; 256]))?;
        scope.add_factory(|r| Ok(r.get::<Vec<u8>>()?.len()))?;
        Ok(())
    });

    c.bench_function("initialize_resolve_dispose", |b| {
        b.iter(|| {
            manager.initialize().unwrap();
            black_box(manager.get::<usize>().unwrap());
            manager.dispose().unwrap();
        })
    });
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_lazy_singleton_cold,
    bench_cached_vs_factory,
    bench_parent_chain_lookup,
    bench_dependency_chain,
    bench_tick
);

criterion_group!(macro_benches, bench_generation_cycle);

criterion_main!(micro_benches, macro_benches);
