//! Resolution engine: locating a registration and materializing its value.

use std::sync::Arc;

use tracing::trace;

use super::{ScopeInner, ScopeState};
use crate::error::{DiError, DiResult};
use crate::internal::ResolutionPath;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registration};
use crate::store::LifetimeStore;

impl ScopeInner {
    pub(crate) fn ensure_resolvable(&self) -> DiResult<()> {
        match *self.state.lock() {
            ScopeState::Committed => Ok(()),
            ScopeState::Open => Err(DiError::ScopeNotCommitted(self.tag.clone())),
            ScopeState::Disposing | ScopeState::Disposed => Err(DiError::ScopeDisposed(self.tag.clone())),
        }
    }

    #[inline]
    pub(crate) fn local(&self, key: &Key) -> Option<Arc<Registration>> {
        self.registry.read().get(key)
    }

    /// Finds the registration for `key` and the scope that owns it.
    ///
    /// Search order: this scope, then included scopes (their own bindings
    /// only), then the parent chain unless parent lookup is disabled.
    pub(crate) fn locate(self: &Arc<Self>, key: &Key) -> Option<(Arc<ScopeInner>, Arc<Registration>)> {
        if let Some(registration) = self.local(key) {
            return Some((self.clone(), registration));
        }
        for child in self.live_includes() {
            if let Some(registration) = child.local(key) {
                return Some((child, registration));
            }
        }
        self.locate_in_parents(key)
    }

    fn locate_in_parents(&self, key: &Key) -> Option<(Arc<ScopeInner>, Arc<Registration>)> {
        if self.options.no_parent_binds {
            return None;
        }
        let mut current = self.parent.as_ref()?.upgrade()?;
        loop {
            if let Some(registration) = current.local(key) {
                return Some((current, registration));
            }
            if current.options.no_parent_binds {
                return None;
            }
            current = current.parent.as_ref()?.upgrade()?;
        }
    }

    /// Resolves `key` as part of the resolution tracked by `path`.
    pub(crate) fn resolve_in(self: &Arc<Self>, key: &Key, path: &ResolutionPath) -> DiResult<AnyArc> {
        self.ensure_resolvable()?;

        // A type this scope cannot see is unresolved, even mid-resolution
        let (owner, registration) = self.locate(key).ok_or(DiError::Unresolved(key.display_name()))?;
        let _guard = path.enter(*key)?;
        if !Arc::ptr_eq(&owner, self) {
            owner.ensure_resolvable()?;
        }
        trace!(
            scope = %self.tag,
            owner = %owner.tag,
            key = key.display_name(),
            lifetime = %registration.lifetime,
            "resolving"
        );
        owner.materialize(&registration, path)
    }

    /// Returns the live value of `registration`, building it if needed.
    ///
    /// Must be called on the scope that owns the registration.
    pub(crate) fn materialize(self: &Arc<Self>, registration: &Registration, path: &ResolutionPath) -> DiResult<AnyArc> {
        let key = registration.key;
        if registration.lifetime == Lifetime::Factory {
            let instance = self.build(registration, path)?;
            if let Some(hook) = &registration.dispose {
                let tracked = instance.clone();
                self.with_store(|store| store.track(key, tracked, hook.clone()))?;
            }
            return Ok(instance);
        }

        if let Some(live) = self.with_store(|store| store.get(&key))? {
            return Ok(live);
        }

        // One build per registration; racing first resolutions wait here and
        // then find the cached value. Same-key re-entry is a cycle and is
        // rejected by the resolution path before this point.
        let _building = registration.build_lock.lock();
        if let Some(live) = self.with_store(|store| store.get(&key))? {
            return Ok(live);
        }
        let instance = self.build(registration, path)?;
        let (live, rejected) =
            self.with_store(|store| store.put_if_absent(key, instance, registration.dispose.clone()))?;
        if let Some(slot) = rejected {
            // Lost to a concurrent replace_instance; the built value is ours to tear down
            let _ = slot.dispose(&self.tag);
        }
        Ok(live)
    }

    /// Runs the constructor. No scope lock is held while user code runs.
    fn build(self: &Arc<Self>, registration: &Registration, path: &ResolutionPath) -> DiResult<AnyArc> {
        let ctx = super::ResolverContext::new(self, path);
        (registration.ctor)(&ctx)
    }

    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&mut LifetimeStore) -> R) -> DiResult<R> {
        let mut guard = self.store.lock();
        match guard.as_mut() {
            Some(store) => Ok(f(store)),
            None => Err(DiError::ScopeDisposed(self.tag.clone())),
        }
    }
}
