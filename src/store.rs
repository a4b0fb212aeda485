//! Lifetime store: the live instances of one scope generation.
//!
//! The store is separate from the registry so teardown only ever touches
//! objects that were actually materialized. `dispose_all` consumes the store;
//! a fresh store is built for the next generation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{DisposalError, DisposeFailure};
use crate::internal::panic_message;
use crate::key::Key;
use crate::registration::{AnyArc, DisposeHook, KeyMap};

/// A materialized instance and its optional teardown hook.
pub(crate) struct Slot {
    pub(crate) key: Key,
    pub(crate) instance: AnyArc,
    pub(crate) dispose: Option<DisposeHook>,
    seq: u64,
}

impl Slot {
    /// Runs the teardown hook, catching errors and panics.
    pub(crate) fn dispose(self, scope: &str) -> Result<(), DisposeFailure> {
        let Some(hook) = self.dispose else {
            return Ok(());
        };
        debug!(scope, key = self.key.display_name(), "disposing instance");
        let failure = match catch_unwind(AssertUnwindSafe(|| hook(&self.instance))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        warn!(scope, key = self.key.display_name(), error = %failure, "dispose failed");
        Err(DisposeFailure {
            scope: scope.to_string(),
            type_name: self.key.display_name(),
            message: failure,
        })
    }
}

pub(crate) struct LifetimeStore {
    scope: String,
    slots: KeyMap<Slot>,
    // Disposable Factory-lifetime instances, kept until teardown
    tracked: Vec<Slot>,
    next_seq: u64,
}

impl LifetimeStore {
    pub(crate) fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            slots: KeyMap::default(),
            tracked: Vec::new(),
            next_seq: 0,
        }
    }

    fn slot(&mut self, key: Key, instance: AnyArc, dispose: Option<DisposeHook>) -> Slot {
        let seq = self.next_seq;
        self.next_seq += 1;
        Slot { key, instance, dispose, seq }
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<AnyArc> {
        self.slots.get(key).map(|slot| slot.instance.clone())
    }

    /// Stores `instance` under `key`, returning the slot it displaced.
    pub(crate) fn put(&mut self, key: Key, instance: AnyArc, dispose: Option<DisposeHook>) -> Option<Slot> {
        let slot = self.slot(key, instance, dispose);
        self.slots.insert(key, slot)
    }

    /// Stores `instance` unless `key` is already live.
    ///
    /// Returns the live value and, when `instance` was not stored, a slot
    /// holding it so the caller can run its teardown.
    pub(crate) fn put_if_absent(
        &mut self,
        key: Key,
        instance: AnyArc,
        dispose: Option<DisposeHook>,
    ) -> (AnyArc, Option<Slot>) {
        if let Some(existing) = self.get(&key) {
            let rejected = self.slot(key, instance, dispose);
            return (existing, Some(rejected));
        }
        let slot = self.slot(key, instance.clone(), dispose);
        self.slots.insert(key, slot);
        (instance, None)
    }

    /// Removes the live instance for `key` without disposing it.
    pub(crate) fn remove(&mut self, key: &Key) -> Option<Slot> {
        self.slots.remove(key)
    }

    /// Keeps a disposable `Factory` instance until teardown.
    pub(crate) fn track(&mut self, key: Key, instance: AnyArc, dispose: DisposeHook) {
        let slot = self.slot(key, instance, Some(dispose));
        self.tracked.push(slot);
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Instances that still have a teardown hook to run.
    pub(crate) fn pending_disposals(&self) -> usize {
        self.slots.values().filter(|slot| slot.dispose.is_some()).count() + self.tracked.len()
    }

    /// Disposes every instance, newest first, and empties the store.
    ///
    /// A failing disposal never stops the sweep; all failures are returned
    /// together once every instance has been visited.
    pub(crate) fn dispose_all(self) -> Result<(), DisposalError> {
        let LifetimeStore { scope, slots, tracked, .. } = self;
        let mut all: Vec<Slot> = slots.into_values().chain(tracked).collect();
        all.sort_by(|a, b| b.seq.cmp(&a.seq));

        debug!(scope = %scope, instances = all.len(), "disposing lifetime store");
        let mut errors = DisposalError::new();
        for slot in all {
            if let Err(failure) = slot.dispose(&scope) {
                errors.push(failure);
            }
        }
        errors.into_result()
    }
}
