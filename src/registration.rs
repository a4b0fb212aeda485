//! Binding and registration types.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BoxError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::scope::ResolverContext;
use crate::reactive::{ChangeCallback, Listenable, Subscription};
use crate::traits::Dispose;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type DisposeHook = Arc<dyn Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type ListenHook = Arc<dyn Fn(&AnyArc, ChangeCallback) -> Option<Subscription> + Send + Sync>;

#[cfg(feature = "ahash")]
pub(crate) type KeyMap<V> = std::collections::HashMap<Key, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type KeyMap<V> = std::collections::HashMap<Key, V>;

/// A typed binding: how to build `T`, how long it lives, and which
/// capabilities (disposal, change notification) the container should use.
///
/// # Examples
///
/// ```
/// use modular_di::{Bind, Lifetime, Notifier, Resolver, Scope};
///
/// struct Counter {
///     changed: Notifier,
/// }
///
/// let scope = Scope::root("app");
/// let bind = Bind::lazy_singleton(|_| Ok(Counter { changed: Notifier::new() }))
///     .notifier(|c: &Counter| &c.changed);
/// assert_eq!(bind.lifetime(), Lifetime::LazySingleton);
///
/// scope.register(bind).unwrap();
/// scope.commit().unwrap();
/// assert!(scope.get::<Counter>().is_ok());
/// ```
pub struct Bind<T> {
    lifetime: Lifetime,
    ctor: Ctor,
    dispose: Option<DisposeHook>,
    listen: Option<ListenHook>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Bind<T> {
    fn with_lifetime<F>(lifetime: Lifetime, factory: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(ctx)?) as AnyArc)
        });
        Self {
            lifetime,
            ctor,
            dispose: None,
            listen: None,
            _marker: PhantomData,
        }
    }

    /// New instance on every resolution.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self::with_lifetime(Lifetime::Factory, factory)
    }

    /// One instance per scope, built when the scope commits.
    pub fn singleton<F>(factory: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self::with_lifetime(Lifetime::Singleton, factory)
    }

    /// One instance per scope, built on first resolution.
    pub fn lazy_singleton<F>(factory: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self::with_lifetime(Lifetime::LazySingleton, factory)
    }

    /// A pre-built value owned by the caller. It is never disposed by the container.
    pub fn instance(value: T) -> Self {
        let value: AnyArc = Arc::new(value);
        let ctor: Ctor = Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> { Ok(value.clone()) });
        Self {
            lifetime: Lifetime::Instance,
            ctor,
            dispose: None,
            listen: None,
            _marker: PhantomData,
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Dispose materialized instances through their [`Dispose`] impl.
    ///
    /// Has no effect on [`Lifetime::Instance`] bindings.
    ///
    /// For [`Lifetime::Factory`] bindings every resolved instance is kept by
    /// the scope until the scope is disposed, so that each one is torn down
    /// exactly once. A long-lived scope that resolves such a binding in a
    /// loop holds all of those instances; prefer a child scope per unit of
    /// work, or leave transients non-disposable and dispose them yourself.
    pub fn disposable(self) -> Self
    where
        T: Dispose,
    {
        self.on_dispose(|value: &T| value.dispose())
    }

    /// Dispose materialized instances with a custom teardown closure.
    pub fn on_dispose<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.dispose = Some(Arc::new(move |any: &AnyArc| match (**any).downcast_ref::<T>() {
            Some(value) => teardown(value),
            None => Ok(()),
        }));
        self
    }

    /// Watchers of `T` subscribe to `T` itself.
    pub fn listenable(self) -> Self
    where
        T: Listenable,
    {
        self.notifier(|value: &T| value as &dyn Listenable)
    }

    /// Watchers of `T` subscribe to a notifier that `T` exposes.
    pub fn notifier<F>(mut self, select: F) -> Self
    where
        F: for<'t> Fn(&'t T) -> &'t dyn Listenable,
        F: Send + Sync + 'static,
    {
        self.listen = Some(Arc::new(move |any: &AnyArc, callback: ChangeCallback| {
            (**any).downcast_ref::<T>().map(|value| select(value).subscribe(callback))
        }));
        self
    }

    pub(crate) fn into_registration(self) -> Registration {
        let dispose = if self.lifetime.is_managed() { self.dispose } else { None };
        Registration {
            key: Key::of::<T>(),
            lifetime: self.lifetime,
            ctor: self.ctor,
            dispose,
            listen: self.listen,
            build_lock: Mutex::new(()),
        }
    }
}

impl<T> fmt::Debug for Bind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bind")
            .field("type", &std::any::type_name::<T>())
            .field("lifetime", &self.lifetime)
            .field("disposable", &self.dispose.is_some())
            .field("listenable", &self.listen.is_some())
            .finish()
    }
}

/// Type-erased registration held by a scope's registry.
pub(crate) struct Registration {
    pub(crate) key: Key,
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    pub(crate) dispose: Option<DisposeHook>,
    pub(crate) listen: Option<ListenHook>,
    // Serializes first construction of cached lifetimes
    pub(crate) build_lock: Mutex<()>,
}

/// Registrations of one scope in insertion order.
///
/// Replacing a key keeps its original slot, so iteration order is the order
/// in which each type was first bound.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<Arc<Registration>>,
    index: KeyMap<usize>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration, returning the one it replaced.
    pub(crate) fn insert(&mut self, registration: Registration) -> Option<Arc<Registration>> {
        let key = registration.key;
        let registration = Arc::new(registration);
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos], registration)),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(registration);
                None
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<Arc<Registration>> {
        self.index.get(key).map(|&pos| self.entries[pos].clone())
    }

    #[inline]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Registrations in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
