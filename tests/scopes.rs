use modular_di::{DiError, Key, Resolver, ResolverCore, Scope, ScopeOptions, ScopeState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Settings {
    theme: &'static str,
}

struct Screen {
    theme: &'static str,
}

#[test]
fn test_child_falls_back_to_parent() {
    let parent = Scope::root("core");
    parent.add_instance(Settings { theme: "dark" }).unwrap();
    parent.commit().unwrap();

    let child = parent.child("feature");
    child.add_factory(|r| Ok(Screen { theme: r.get::<Settings>()?.theme })).unwrap();
    child.commit().unwrap();

    assert_eq!(child.get::<Screen>().unwrap().theme, "dark");
    assert!(matches!(parent.get::<Screen>(), Err(DiError::Unresolved(_))));
}

#[test]
fn test_child_binding_shadows_parent() {
    let parent = Scope::root("core");
    parent.add_instance(Settings { theme: "dark" }).unwrap();
    parent.commit().unwrap();

    let child = parent.child("feature");
    child.add_instance(Settings { theme: "light" }).unwrap();
    child.commit().unwrap();

    assert_eq!(child.get::<Settings>().unwrap().theme, "light");
    assert_eq!(parent.get::<Settings>().unwrap().theme, "dark");
}

#[test]
fn test_parent_singleton_shared_by_children() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    let parent = Scope::root("core");
    parent
        .add_lazy_singleton(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Settings { theme: "shared" })
        })
        .unwrap();
    parent.commit().unwrap();

    let a = parent.child("a");
    a.commit().unwrap();
    let b = parent.child("b");
    b.commit().unwrap();

    let from_a = a.get::<Settings>().unwrap();
    let from_b = b.get::<Settings>().unwrap();
    assert!(Arc::ptr_eq(&from_a, &from_b));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(parent.live_instances(), 1);
    assert_eq!(a.live_instances(), 0);
}

#[test]
fn test_parent_factory_does_not_see_child_bindings() {
    let parent = Scope::root("core");
    parent.add_factory(|r| Ok(Screen { theme: r.get::<Settings>()?.theme })).unwrap();
    parent.commit().unwrap();

    let child = parent.child("feature");
    child.add_instance(Settings { theme: "child-only" }).unwrap();
    child.commit().unwrap();

    // The factory runs against the scope that owns it
    assert!(matches!(child.get::<Screen>(), Err(DiError::Unresolved(_))));
}

#[test]
fn test_no_parent_binds_isolates_child() {
    let parent = Scope::root("core");
    parent.add_instance(Settings { theme: "dark" }).unwrap();
    parent.commit().unwrap();

    let options = ScopeOptions {
        no_parent_binds: true,
        ..ScopeOptions::default()
    };
    let child = parent.child_with("isolated", options);
    child.commit().unwrap();

    match child.get::<Settings>() {
        Err(DiError::Unresolved(name)) => assert!(name.ends_with("Settings")),
        other => panic!("expected Unresolved, got {:?}", other.map(|_| ())),
    }
    assert!(!child.can_resolve(&Key::of::<Settings>()));
}

#[test]
fn test_include_exposes_child_bindings() {
    let core = Scope::root("core");
    core.add_instance(Settings { theme: "dark" }).unwrap();
    core.commit().unwrap();

    let inner = core.child("inner");
    inner.add_lazy_singleton(|r| Ok(Screen { theme: r.get::<Settings>()?.theme })).unwrap();
    inner.commit().unwrap();
    core.include(&inner).unwrap();

    let via_core = core.get::<Screen>().unwrap();
    let via_inner = inner.get::<Screen>().unwrap();
    assert!(Arc::ptr_eq(&via_core, &via_inner));
    assert_eq!(via_core.theme, "dark");
}

#[test]
fn test_parent_must_be_committed() {
    let parent = Scope::root("core");
    parent.add_instance(Settings { theme: "dark" }).unwrap();

    let child = parent.child("feature");
    child.commit().unwrap();

    match child.get::<Settings>() {
        Err(DiError::ScopeNotCommitted(tag)) => assert_eq!(tag, "core"),
        other => panic!("expected ScopeNotCommitted, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_disposed_parent_rejects_child_lookups() {
    let parent = Scope::root("core");
    parent.add_instance(Settings { theme: "dark" }).unwrap();
    parent.commit().unwrap();
    let child = parent.child("feature");
    child.commit().unwrap();

    parent.dispose_recursive().unwrap();
    assert!(matches!(child.get::<Settings>(), Err(DiError::ScopeDisposed(tag)) if tag == "core"));
    // child was not included, so it is still usable on its own
    assert_eq!(child.state(), ScopeState::Committed);
}

#[test]
fn test_dropped_parent_is_not_kept_alive() {
    let parent = Scope::root("core");
    parent.commit().unwrap();
    let child = parent.child("feature");
    child.commit().unwrap();
    drop(parent);

    assert!(child.parent_tag().is_none());
    assert!(matches!(child.get::<Settings>(), Err(DiError::Unresolved(_))));
}
