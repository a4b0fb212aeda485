use modular_di::{DiError, Resolver, Scope, ScopeOptions};
use std::sync::Arc;

struct A(#[allow(dead_code)] Arc<B>);
struct B(#[allow(dead_code)] Arc<A>);

struct C(#[allow(dead_code)] Arc<D>);
struct D(#[allow(dead_code)] Arc<E>);
struct E(#[allow(dead_code)] Arc<C>);

fn short(path: &[&'static str]) -> Vec<String> {
    path.iter()
        .map(|name| name.rsplit("::").next().unwrap_or(*name).to_string())
        .collect()
}

#[test]
fn test_two_node_cycle_is_reported() {
    let scope = Scope::root("app");
    scope.add_factory(|r| Ok(A(r.get::<B>()?))).unwrap();
    scope.add_factory(|r| Ok(B(r.get::<A>()?))).unwrap();
    scope.commit().unwrap();

    match scope.get::<A>() {
        Err(DiError::Circular(path)) => assert_eq!(short(&path), vec!["A", "B", "A"]),
        other => panic!("expected Circular, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_three_node_cycle_through_lazy_singletons() {
    let scope = Scope::root("app");
    scope.add_lazy_singleton(|r| Ok(C(r.get::<D>()?))).unwrap();
    scope.add_lazy_singleton(|r| Ok(D(r.get::<E>()?))).unwrap();
    scope.add_lazy_singleton(|r| Ok(E(r.get::<C>()?))).unwrap();
    scope.commit().unwrap();

    match scope.get::<D>() {
        Err(DiError::Circular(path)) => assert_eq!(short(&path), vec!["D", "E", "C", "D"]),
        other => panic!("expected Circular, got {:?}", other.map(|_| ())),
    }
    // Nothing half-built was cached
    assert_eq!(scope.live_instances(), 0);
}

#[test]
fn test_cycle_in_eager_singletons_fails_commit() {
    let scope = Scope::root("app");
    scope.add_singleton(|r| Ok(A(r.get::<B>()?))).unwrap();
    scope.add_singleton(|r| Ok(B(r.get::<A>()?))).unwrap();

    assert!(matches!(scope.commit(), Err(DiError::Circular(_))));
    assert!(scope.is_committed());
}

#[test]
fn test_cycle_across_parent_and_child() {
    // A is in the child and needs B from the parent, but the parent's B
    // can only see the parent, so this is unresolved rather than circular.
    let parent = Scope::root("core");
    parent.add_factory(|r| Ok(B(r.get::<A>()?))).unwrap();
    parent.commit().unwrap();
    let child = parent.child("inner");
    child.add_factory(|r| Ok(A(r.get::<B>()?))).unwrap();
    child.commit().unwrap();

    assert!(matches!(child.get::<A>(), Err(DiError::Unresolved(_))));

    // Through an include the parent does reach A, closing the loop
    parent.include(&child).unwrap();
    assert!(matches!(child.get::<A>(), Err(DiError::Circular(_))));
}

#[test]
fn test_depth_limit() {
    struct L0;
    struct L1;
    struct L2;
    struct L3;

    let scope = Scope::with_options(
        "shallow",
        ScopeOptions {
            max_depth: 3,
            ..ScopeOptions::default()
        },
    );
    scope.add_factory(|r| r.get::<L1>().map(|_| L0)).unwrap();
    scope.add_factory(|r| r.get::<L2>().map(|_| L1)).unwrap();
    scope.add_factory(|r| r.get::<L3>().map(|_| L2)).unwrap();
    scope.add_factory(|_| Ok(L3)).unwrap();
    scope.commit().unwrap();

    assert!(matches!(scope.get::<L0>(), Err(DiError::DepthExceeded(3))));
    assert!(scope.get::<L1>().is_ok());
}

#[test]
fn test_scope_usable_after_cycle_error() {
    let scope = Scope::root("app");
    scope.add_factory(|r| Ok(A(r.get::<B>()?))).unwrap();
    scope.add_factory(|r| Ok(B(r.get::<A>()?))).unwrap();
    scope.add_instance(7u8).unwrap();
    scope.commit().unwrap();

    assert!(scope.get::<A>().is_err());
    assert_eq!(*scope.get::<u8>().unwrap(), 7);
}
