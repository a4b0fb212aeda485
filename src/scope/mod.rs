//! Scopes: registration, commit, resolution and teardown.
//!
//! A [`Scope`] is open for registration until [`Scope::commit`]; after that
//! its registry is sealed and it can resolve. Scopes form a tree through
//! non-owning parent links, and a scope can *include* another scope so that
//! lookups through it also reach the included scope's own bindings.

mod context;
mod resolve;

pub use context::ResolverContext;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ContainerConfig;
use crate::error::{DiError, DiResult, DisposalError};
use crate::internal::ResolutionPath;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::reactive::{Consumer, Pending, ReactiveBridge};
use crate::registration::{AnyArc, Bind, Registration, Registry};
use crate::store::LifetimeStore;
use crate::traits::ResolverCore;

/// Lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeState {
    /// Accepting registrations; resolution is rejected
    Open,
    /// Registry sealed; resolution allowed
    Committed,
    /// Teardown in progress
    Disposing,
    /// Torn down; every operation except queries is rejected
    Disposed,
}

/// Per-scope behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeOptions {
    /// Re-registering a type before commit replaces the earlier binding
    pub allow_override: bool,
    /// Longest dependency chain a single resolution may walk
    pub max_depth: usize,
    /// Lookups stop at this scope instead of falling back to the parent chain
    pub no_parent_binds: bool,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            allow_override: true,
            max_depth: 1024,
            no_parent_binds: false,
        }
    }
}

impl From<&ContainerConfig> for ScopeOptions {
    fn from(config: &ContainerConfig) -> Self {
        Self {
            allow_override: config.allow_override,
            max_depth: config.max_depth,
            no_parent_binds: false,
        }
    }
}

pub(crate) struct ScopeInner {
    tag: String,
    parent: Option<Weak<ScopeInner>>,
    includes: Mutex<Vec<Weak<ScopeInner>>>,
    options: ScopeOptions,
    state: Mutex<ScopeState>,
    registry: RwLock<Registry>,
    // `None` once the scope has been torn down
    store: Mutex<Option<LifetimeStore>>,
    bridge: ReactiveBridge,
}

impl ScopeInner {
    pub(crate) fn live_includes(&self) -> Vec<Arc<ScopeInner>> {
        self.includes.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// This scope, its included scopes and its ancestors.
    fn reachable(self: &Arc<Self>) -> Vec<Arc<ScopeInner>> {
        let mut scopes = vec![self.clone()];
        scopes.extend(self.live_includes());
        let mut parent = self.parent.as_ref().and_then(Weak::upgrade);
        while let Some(scope) = parent {
            parent = scope.parent.as_ref().and_then(Weak::upgrade);
            scopes.push(scope);
        }
        scopes
    }

    fn dispose_tree(&self) -> Result<(), DisposalError> {
        {
            let mut state = self.state.lock();
            if matches!(*state, ScopeState::Disposing | ScopeState::Disposed) {
                return Ok(());
            }
            *state = ScopeState::Disposing;
        }
        info!(scope = %self.tag, "disposing scope");

        let mut errors = DisposalError::new();
        let includes = std::mem::take(&mut *self.includes.lock());
        for child in includes.iter().rev().filter_map(Weak::upgrade) {
            if let Err(failures) = child.dispose_tree() {
                errors.absorb(failures);
            }
        }

        let store = self.store.lock().take();
        if let Some(store) = store {
            if let Err(failures) = store.dispose_all() {
                errors.absorb(failures);
            }
        }
        self.bridge.clear();
        *self.state.lock() = ScopeState::Disposed;

        if errors.is_empty() {
            info!(scope = %self.tag, "scope disposed");
        } else {
            warn!(scope = %self.tag, failures = errors.len(), "scope disposed with failures");
        }
        errors.into_result()
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if let Some(store) = self.store.get_mut() {
            let pending = store.pending_disposals();
            if pending > 0 {
                warn!(scope = %self.tag, pending, "scope dropped without dispose_recursive; instances were not disposed");
            }
        }
    }
}

/// A node of the scope tree.
///
/// Cloning yields another handle to the same scope, which is how a scope
/// is shared across threads.
///
/// # Examples
///
/// ```
/// use modular_di::{Resolver, Scope};
///
/// struct Settings { theme: &'static str }
/// struct Page { theme: &'static str }
///
/// let parent = Scope::root("core");
/// parent.add_instance(Settings { theme: "dark" }).unwrap();
/// parent.commit().unwrap();
///
/// let child = parent.child("feature");
/// child.add_factory(|r| Ok(Page { theme: r.get::<Settings>()?.theme })).unwrap();
/// child.commit().unwrap();
///
/// assert_eq!(child.get::<Page>().unwrap().theme, "dark");
/// // the parent does not see the child's bindings
/// assert!(parent.try_get::<Page>().unwrap().is_none());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Creates a scope without a parent.
    pub fn root(tag: impl Into<String>) -> Self {
        Self::with_options(tag, ScopeOptions::default())
    }

    pub fn with_options(tag: impl Into<String>, options: ScopeOptions) -> Self {
        Self::build(tag.into(), None, options)
    }

    /// Creates a child scope that falls back to this scope's bindings.
    pub fn child(&self, tag: impl Into<String>) -> Scope {
        let options = ScopeOptions {
            no_parent_binds: false,
            ..self.inner.options
        };
        self.child_with(tag, options)
    }

    pub fn child_with(&self, tag: impl Into<String>, options: ScopeOptions) -> Scope {
        Self::build(tag.into(), Some(Arc::downgrade(&self.inner)), options)
    }

    fn build(tag: String, parent: Option<Weak<ScopeInner>>, options: ScopeOptions) -> Self {
        debug!(scope = %tag, has_parent = parent.is_some(), "scope created");
        Self {
            inner: Arc::new(ScopeInner {
                store: Mutex::new(Some(LifetimeStore::new(tag.clone()))),
                tag,
                parent,
                includes: Mutex::new(Vec::new()),
                options,
                state: Mutex::new(ScopeState::Open),
                registry: RwLock::new(Registry::new()),
                bridge: ReactiveBridge::new(),
            }),
        }
    }

    // ----- Registration -----

    /// Adds or replaces the binding for `T`.
    ///
    /// Fails with [`DiError::ScopeSealed`] once the scope is committed, and
    /// with [`DiError::DuplicateRegistration`] when `T` is already bound and
    /// overrides are disabled.
    pub fn register<T: Send + Sync + 'static>(&self, bind: Bind<T>) -> DiResult<&Self> {
        let registration = bind.into_registration();
        let key = registration.key;
        let lifetime = registration.lifetime;

        let replaced = {
            let state = self.inner.state.lock();
            match *state {
                ScopeState::Open => {}
                ScopeState::Committed => return Err(DiError::ScopeSealed(self.inner.tag.clone())),
                ScopeState::Disposing | ScopeState::Disposed => {
                    return Err(DiError::ScopeDisposed(self.inner.tag.clone()))
                }
            }
            let mut registry = self.inner.registry.write();
            if !self.inner.options.allow_override && registry.contains_key(&key) {
                return Err(DiError::DuplicateRegistration(key.display_name()));
            }
            registry.insert(registration).is_some()
        };

        debug!(scope = %self.inner.tag, key = key.display_name(), %lifetime, replaced, "registered");
        Ok(self)
    }

    /// Registers a factory that builds a new `T` on every resolution.
    pub fn add_factory<T, F>(&self, factory: F) -> DiResult<&Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(Bind::factory(factory))
    }

    /// Registers a `T` built once when the scope commits.
    pub fn add_singleton<T, F>(&self, factory: F) -> DiResult<&Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(Bind::singleton(factory))
    }

    /// Registers a `T` built once, on first resolution.
    pub fn add_lazy_singleton<T, F>(&self, factory: F) -> DiResult<&Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(Bind::lazy_singleton(factory))
    }

    /// Registers a caller-owned value.
    pub fn add_instance<T: Send + Sync + 'static>(&self, value: T) -> DiResult<&Self> {
        self.register(Bind::instance(value))
    }

    /// Seals the registry and materializes eager bindings.
    ///
    /// `Instance` values are stored first, then every `Singleton` is built
    /// in registration order. If one fails to build the scope stays
    /// committed and the error is returned.
    pub fn commit(&self) -> DiResult<()> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                ScopeState::Open => *state = ScopeState::Committed,
                ScopeState::Committed => return Err(DiError::ScopeSealed(self.inner.tag.clone())),
                ScopeState::Disposing | ScopeState::Disposed => {
                    return Err(DiError::ScopeDisposed(self.inner.tag.clone()))
                }
            }
        }

        let (mut eager, total): (Vec<Arc<Registration>>, usize) = {
            let registry = self.inner.registry.read();
            let eager = registry.iter().filter(|r| r.lifetime.is_eager()).cloned().collect();
            (eager, registry.len())
        };
        // stable: keeps registration order within each group
        eager.sort_by_key(|r| r.lifetime != Lifetime::Instance);

        for registration in &eager {
            let path = ResolutionPath::new(self.inner.options.max_depth);
            let built = path
                .enter(registration.key)
                .and_then(|_guard| self.inner.materialize(registration, &path));
            if let Err(err) = built {
                warn!(scope = %self.inner.tag, key = registration.key.display_name(), error = %err, "eager build failed");
                return Err(err);
            }
        }

        info!(scope = %self.inner.tag, registrations = total, eager = eager.len(), "scope committed");
        Ok(())
    }

    /// Makes `child`'s own bindings visible to lookups through this scope.
    ///
    /// The link is non-owning. Included scopes are torn down first when this
    /// scope is disposed.
    pub fn include(&self, child: &Scope) -> DiResult<()> {
        if self.is_disposed() {
            return Err(DiError::ScopeDisposed(self.inner.tag.clone()));
        }
        if Arc::ptr_eq(&self.inner, &child.inner) {
            return Ok(());
        }
        let mut includes = self.inner.includes.lock();
        let target = Arc::as_ptr(&child.inner);
        if !includes.iter().any(|w| w.as_ptr() == target) {
            includes.push(Arc::downgrade(&child.inner));
            debug!(scope = %self.inner.tag, included = %child.inner.tag, "scope included");
        }
        Ok(())
    }

    // ----- Teardown -----

    /// Disposes included scopes, then this scope's instances, newest first,
    /// then drops every reactive subscription held here.
    ///
    /// Every instance is visited even if some fail; the failures come back
    /// together as [`DiError::Disposal`]. Calling this again is a no-op.
    pub fn dispose_recursive(&self) -> DiResult<()> {
        self.inner.dispose_tree().map_err(DiError::from)
    }

    /// Swaps the live value of `T` in the scope that owns its binding.
    ///
    /// The displaced value is disposed right away if the container built it.
    /// The new value belongs to the caller and is never disposed by the
    /// container. Watchers of `T` are re-notified on the next [`tick`](Self::tick)
    /// and resubscribed to the new value.
    pub fn replace_instance<T: Send + Sync + 'static>(&self, value: T) -> DiResult<()> {
        let key = Key::of::<T>();
        let (owner, registration) = self.owner_of(&key)?;
        if registration.lifetime == Lifetime::Factory {
            return Err(DiError::NotReplaceable(key.display_name()));
        }

        let instance: AnyArc = Arc::new(value);
        let displaced = owner.with_store(|store| store.put(key, instance.clone(), None))?;
        debug!(scope = %owner.tag, key = key.display_name(), "instance replaced");
        owner.bridge.invalidate(key, Some(&instance), registration.listen.as_ref());

        match displaced.map(|slot| slot.dispose(&owner.tag)) {
            Some(Err(failure)) => {
                let mut errors = DisposalError::new();
                errors.push(failure);
                Err(errors.into())
            }
            _ => Ok(()),
        }
    }

    /// Drops and disposes the live value of `T`; the next resolution builds
    /// a fresh one. Returns `false` when no value was live.
    pub fn dispose_instance<T: Send + Sync + 'static>(&self) -> DiResult<bool> {
        let key = Key::of::<T>();
        let (owner, _) = self.owner_of(&key)?;
        let removed = owner.with_store(|store| store.remove(&key))?;
        owner.bridge.invalidate(key, None, None);

        let Some(slot) = removed else {
            return Ok(false);
        };
        debug!(scope = %owner.tag, key = key.display_name(), "instance unbound");
        if let Err(failure) = slot.dispose(&owner.tag) {
            let mut errors = DisposalError::new();
            errors.push(failure);
            return Err(errors.into());
        }
        Ok(true)
    }

    fn owner_of(&self, key: &Key) -> DiResult<(Arc<ScopeInner>, Arc<Registration>)> {
        self.inner.ensure_resolvable()?;
        let (owner, registration) = self.inner.locate(key).ok_or(DiError::Unresolved(key.display_name()))?;
        owner.ensure_resolvable()?;
        Ok((owner, registration))
    }

    // ----- Reactive access -----

    /// Resolves `T` without observing it.
    pub fn read<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        crate::traits::Resolver::get::<T>(self)
    }

    /// Resolves `T` and records `consumer` as an observer of it.
    ///
    /// Watching the same type twice refreshes the existing observation.
    pub fn watch<T: Send + Sync + 'static>(&self, consumer: &Consumer) -> DiResult<Arc<T>> {
        let key = Key::of::<T>();
        let any = self.resolve_any(&key)?;
        if let Some((owner, registration)) = self.inner.locate(&key) {
            owner.bridge.observe(consumer, key, &any, registration.listen.as_ref());
        }
        any.downcast::<T>().map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Ends every observation `consumer` holds in the scopes reachable from here.
    pub fn unwatch(&self, consumer: &Consumer) {
        for scope in self.inner.reachable() {
            scope.bridge.unwatch(consumer);
        }
    }

    /// Delivers pending re-notifications of observations held in this scope.
    ///
    /// Each changed consumer is called once, with the last key that changed.
    /// Returns the number of consumers notified.
    pub fn tick(&self) -> usize {
        self.inner.bridge.tick()
    }

    /// Takes this scope's pending re-notifications for delivery elsewhere.
    pub(crate) fn drain_notifications(&self) -> Vec<Pending> {
        self.inner.bridge.drain()
    }

    pub fn is_watching<T: 'static>(&self, consumer: &Consumer) -> bool {
        let key = Key::of::<T>();
        self.inner
            .locate(&key)
            .is_some_and(|(owner, _)| owner.bridge.is_watching(consumer, key))
    }

    /// Number of consumers watching `T` in the scope that owns it.
    pub fn watcher_count<T: 'static>(&self) -> usize {
        let key = Key::of::<T>();
        self.inner
            .locate(&key)
            .map_or(0, |(owner, _)| owner.bridge.watchers_of(key))
    }

    /// Observations held in this scope's bridge.
    pub fn observation_count(&self) -> usize {
        self.inner.bridge.observation_count()
    }

    /// Consumers waiting for the next [`tick`](Self::tick).
    pub fn pending_notifications(&self) -> usize {
        self.inner.bridge.pending_count()
    }

    // ----- Introspection -----

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn state(&self) -> ScopeState {
        *self.inner.state.lock()
    }

    pub fn options(&self) -> ScopeOptions {
        self.inner.options
    }

    pub fn is_committed(&self) -> bool {
        self.state() == ScopeState::Committed
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state(), ScopeState::Disposing | ScopeState::Disposed)
    }

    /// Tag of the parent scope, if it is still alive.
    pub fn parent_tag(&self) -> Option<String> {
        let parent = self.inner.parent.as_ref()?.upgrade()?;
        Some(parent.tag.clone())
    }

    /// Returns `true` if `T` is bound in this scope itself.
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.inner.registry.read().contains_key(&Key::of::<T>())
    }

    /// Bindings of this scope in registration order.
    pub fn registered_types(&self) -> Vec<(Key, Lifetime)> {
        self.inner.registry.read().iter().map(|r| (r.key, r.lifetime)).collect()
    }

    /// Number of cached instances currently live in this scope.
    pub fn live_instances(&self) -> usize {
        self.inner.store.lock().as_ref().map_or(0, LifetimeStore::len)
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        let path = ResolutionPath::new(self.inner.options.max_depth);
        self.inner.resolve_in(key, &path)
    }

    fn can_resolve(&self, key: &Key) -> bool {
        self.inner.locate(key).is_some()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("tag", &self.inner.tag)
            .field("state", &self.state())
            .field("registrations", &self.inner.registry.read().len())
            .field("includes", &self.inner.includes.lock().len())
            .finish()
    }
}
