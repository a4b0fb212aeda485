//! Concurrent access tests
//!
//! These tests verify that shared lifetimes stay shared, and that teardown
//! still reaches every instance, when several threads resolve at once.

use modular_di::{Bind, BoxError, DiResult, Dispose, Resolver, Scope, ScopeManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;

struct Resource {
    disposed: Arc<AtomicUsize>,
}

impl Dispose for Resource {
    fn dispose(&self) -> Result<(), BoxError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn slow_resource_scope(built: &Arc<AtomicUsize>, disposed: &Arc<AtomicUsize>) -> Scope {
    let (built, disposed) = (built.clone(), disposed.clone());
    let scope = Scope::root("app");
    scope
        .register(
            Bind::lazy_singleton(move |_| {
                built.fetch_add(1, Ordering::SeqCst);
                // Widen the window in which racing threads would both build
                thread::sleep(Duration::from_millis(20));
                Ok(Resource { disposed: disposed.clone() })
            })
            .disposable(),
        )
        .unwrap();
    scope.commit().unwrap();
    scope
}

#[test]
fn test_racing_first_resolutions_build_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let disposed = Arc::new(AtomicUsize::new(0));
    let scope = slow_resource_scope(&built, &disposed);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let scope = scope.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                scope.get::<Resource>().unwrap()
            })
        })
        .collect();
    let resolved: Vec<Arc<Resource>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    for other in &resolved[1..] {
        assert!(Arc::ptr_eq(&resolved[0], other));
    }

    scope.dispose_recursive().unwrap();
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_racing_dependencies_share_one_singleton() {
    struct Config {
        id: usize,
    }
    struct Handler {
        config: Arc<Config>,
    }

    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let scope = Scope::root("app");
    scope
        .add_lazy_singleton(move |_| {
            let id = counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            Ok(Config { id })
        })
        .unwrap();
    scope.add_factory(|r| Ok(Handler { config: r.get::<Config>()? })).unwrap();
    scope.commit().unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let ids: Vec<usize> = (0..THREADS)
        .map(|_| {
            let scope = scope.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                scope.get::<Handler>().unwrap().config.id
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(ids.iter().all(|id| *id == 0));
}

#[test]
fn test_concurrent_resolution_across_generations() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = disposed.clone();
    let mut manager = ScopeManager::new(move |scope: &Scope| -> DiResult<()> {
        let counter = counter.clone();
        scope.register(Bind::lazy_singleton(move |_| Ok(Resource { disposed: counter.clone() })).disposable())?;
        Ok(())
    });

    for generation in 1..=3 {
        manager.initialize().unwrap();
        let scope = manager.injector().unwrap().clone();
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let scope = scope.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    scope.get::<Resource>().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        manager.dispose().unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), generation);
    }
}
