//! Reactive re-notification for watched instances.
//!
//! Any resolved value that can hand out change subscriptions implements
//! [`Listenable`]. A [`Consumer`] watches a type through a scope; when the
//! watched value signals a change (or is replaced or unbound), the consumer
//! is marked dirty and re-notified once on the next [`tick`](crate::Scope::tick),
//! however many changes arrived in between.
//!
//! The bridge never owns consumers or instances: it keeps `Weak` references
//! to both, and each subscription callback only holds a `Weak` back to the
//! bridge.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::key::Key;
use crate::registration::{AnyArc, ListenHook};

/// Callback fired when a listenable value changes.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

type RebuildFn = dyn Fn(&Key) + Send + Sync;

/// Handle returned by [`Listenable::subscribe`]. Unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A subscription with nothing to undo.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Unsubscribes now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}

/// Capability of a value that can report changes.
pub trait Listenable: Send + Sync {
    /// Registers `callback` until the returned [`Subscription`] is dropped.
    fn subscribe(&self, callback: ChangeCallback) -> Subscription;
}

type ListenerList<C> = Arc<Mutex<Vec<(u64, C)>>>;

fn remove_on_cancel<C: Send + 'static>(listeners: &ListenerList<C>, id: u64) -> Subscription {
    let weak = Arc::downgrade(listeners);
    Subscription::new(move || {
        if let Some(listeners) = weak.upgrade() {
            listeners.lock().retain(|(lid, _)| *lid != id);
        }
    })
}

/// A change notifier that services embed to become [`Listenable`].
///
/// # Examples
///
/// ```
/// use modular_di::{Listenable, Notifier};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let notifier = Notifier::new();
/// let hits = Arc::new(AtomicUsize::new(0));
/// let h = hits.clone();
/// let sub = notifier.subscribe(Arc::new(move || { h.fetch_add(1, Ordering::SeqCst); }));
///
/// notifier.notify();
/// drop(sub);
/// notifier.notify();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Default)]
pub struct Notifier {
    listeners: ListenerList<ChangeCallback>,
    next_id: AtomicU64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls every listener. Listeners run outside the internal lock.
    pub fn notify(&self) {
        let listeners: Vec<ChangeCallback> = self.listeners.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Listenable for Notifier {
    fn subscribe(&self, callback: ChangeCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, callback));
        remove_on_cancel(&self.listeners, id)
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("listeners", &self.listener_count()).finish()
    }
}

type EventCallback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A broadcast stream of events. Each emitted event also counts as a change
/// for [`Listenable`] subscribers.
///
/// # Examples
///
/// ```
/// use modular_di::EventChannel;
/// use std::sync::{Arc, Mutex};
///
/// let channel = EventChannel::<String>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let s = seen.clone();
/// let _sub = channel.listen(move |e: &String| s.lock().unwrap().push(e.clone()));
///
/// channel.emit("saved".to_string());
/// assert_eq!(*seen.lock().unwrap(), vec!["saved".to_string()]);
/// ```
pub struct EventChannel<E> {
    listeners: ListenerList<EventCallback<E>>,
    next_id: AtomicU64,
}

impl<E: Send + Sync + 'static> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Receives every event emitted until the subscription is dropped.
    pub fn listen<F>(&self, on_event: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(on_event)));
        remove_on_cancel(&self.listeners, id)
    }

    pub fn emit(&self, event: E) {
        let listeners: Vec<EventCallback<E>> = self.listeners.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<E: Send + Sync + 'static> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync + 'static> Listenable for EventChannel<E> {
    fn subscribe(&self, callback: ChangeCallback) -> Subscription {
        self.listen(move |_: &E| callback())
    }
}

/// Identifier of a [`Consumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

static NEXT_CONSUMER: AtomicU64 = AtomicU64::new(1);

/// A party that watches resolved instances and rebuilds when they change.
///
/// The consumer owns its rebuild callback; scopes only hold a weak
/// reference, so dropping the consumer silently ends all its observations.
///
/// # Examples
///
/// ```
/// use modular_di::{Bind, Consumer, Key, Notifier, Scope};
/// use std::sync::{Arc, Mutex};
///
/// struct Counter { changed: Notifier }
///
/// let scope = Scope::root("app");
/// scope.register(Bind::singleton(|_| Ok(Counter { changed: Notifier::new() }))
///     .notifier(|c: &Counter| &c.changed)).unwrap();
/// scope.commit().unwrap();
///
/// let rebuilt = Arc::new(Mutex::new(Vec::new()));
/// let log = rebuilt.clone();
/// let consumer = Consumer::new(move |changed: &Key| log.lock().unwrap().push(*changed));
///
/// let counter = scope.watch::<Counter>(&consumer).unwrap();
/// counter.changed.notify();
/// counter.changed.notify();
/// assert_eq!(scope.tick(), 1);
/// assert_eq!(*rebuilt.lock().unwrap(), vec![Key::of::<Counter>()]);
/// ```
pub struct Consumer {
    id: ConsumerId,
    rebuild: Arc<RebuildFn>,
}

impl Consumer {
    pub fn new<F>(rebuild: F) -> Self
    where
        F: Fn(&Key) + Send + Sync + 'static,
    {
        Self {
            id: ConsumerId(NEXT_CONSUMER.fetch_add(1, Ordering::Relaxed)),
            rebuild: Arc::new(rebuild),
        }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("id", &self.id).finish()
    }
}

struct Observation {
    rebuild: Weak<RebuildFn>,
    notifier: Weak<dyn Any + Send + Sync>,
    subscription: Option<Subscription>,
}

impl Observation {
    fn watches(&self, instance: &AnyArc) -> bool {
        self.notifier.upgrade().is_some_and(|live| Arc::ptr_eq(&live, instance))
    }
}

// Orders changes across every bridge in the process
static NEXT_CHANGE: AtomicU64 = AtomicU64::new(0);

/// A dirty consumer waiting for its next re-notification.
pub(crate) struct Pending {
    consumer: ConsumerId,
    first_seq: u64,
    last_seq: u64,
    last_changed: Key,
    rebuild: Weak<RebuildFn>,
}

impl Pending {
    fn merge(&mut self, other: Pending) {
        self.first_seq = self.first_seq.min(other.first_seq);
        if other.last_seq > self.last_seq {
            self.last_seq = other.last_seq;
            self.last_changed = other.last_changed;
            self.rebuild = other.rebuild;
        }
    }
}

/// Calls each consumer in `batch` once, with the last key that changed for
/// it, in the order consumers first became dirty.
///
/// Batches drained from several bridges may name the same consumer; those
/// entries are merged so it is still notified only once.
pub(crate) fn deliver(batch: impl IntoIterator<Item = Pending>) -> usize {
    let mut merged: HashMap<ConsumerId, Pending> = HashMap::new();
    for pending in batch {
        match merged.get_mut(&pending.consumer) {
            Some(existing) => existing.merge(pending),
            None => {
                merged.insert(pending.consumer, pending);
            }
        }
    }
    let mut ordered: Vec<Pending> = merged.into_values().collect();
    ordered.sort_by_key(|pending| pending.first_seq);

    let mut delivered = 0;
    for pending in ordered {
        if let Some(rebuild) = pending.rebuild.upgrade() {
            rebuild(&pending.last_changed);
            delivered += 1;
        }
    }
    delivered
}

#[derive(Default)]
struct BridgeState {
    observations: HashMap<(ConsumerId, Key), Observation>,
    dirty: HashMap<ConsumerId, Pending>,
    closed: bool,
}

impl BridgeState {
    fn mark_changed(&mut self, consumer: ConsumerId, key: Key) {
        if self.closed {
            return;
        }
        let Some(observation) = self.observations.get(&(consumer, key)) else {
            return;
        };
        let rebuild = observation.rebuild.clone();
        let seq = NEXT_CHANGE.fetch_add(1, Ordering::Relaxed);
        match self.dirty.get_mut(&consumer) {
            Some(pending) => {
                pending.last_seq = seq;
                pending.last_changed = key;
                pending.rebuild = rebuild;
            }
            None => {
                self.dirty.insert(
                    consumer,
                    Pending { consumer, first_seq: seq, last_seq: seq, last_changed: key, rebuild },
                );
            }
        }
    }
}

/// Tracks which consumers watch which keys of one scope.
pub(crate) struct ReactiveBridge {
    state: Arc<Mutex<BridgeState>>,
}

impl ReactiveBridge {
    pub(crate) fn new() -> Self {
        Self { state: Arc::new(Mutex::new(BridgeState::default())) }
    }

    fn change_callback(&self, consumer: ConsumerId, key: Key) -> ChangeCallback {
        let state = Arc::downgrade(&self.state);
        Arc::new(move || {
            if let Some(state) = state.upgrade() {
                trace!(consumer = consumer.0, key = key.display_name(), "change observed");
                state.lock().mark_changed(consumer, key);
            }
        })
    }

    /// Records (or refreshes) `consumer` watching `key`, subscribing to the
    /// instance when the binding carries a listen hook.
    pub(crate) fn observe(&self, consumer: &Consumer, key: Key, instance: &AnyArc, listen: Option<&ListenHook>) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            if let Some(existing) = state.observations.get_mut(&(consumer.id, key)) {
                if existing.watches(instance) {
                    existing.rebuild = Arc::downgrade(&consumer.rebuild);
                    return;
                }
            }
        }

        // Subscribe outside the lock; a listenable may call back synchronously.
        let subscription = listen.and_then(|hook| hook(instance, self.change_callback(consumer.id, key)));
        let observation = Observation {
            rebuild: Arc::downgrade(&consumer.rebuild),
            notifier: Arc::downgrade(instance),
            subscription,
        };

        let replaced = {
            let mut state = self.state.lock();
            if state.closed {
                Some(observation)
            } else {
                state.observations.insert((consumer.id, key), observation)
            }
        };
        drop(replaced);
    }

    /// Marks every watcher of `key` changed and moves their subscriptions to
    /// `replacement` (or drops them when the value is gone).
    pub(crate) fn invalidate(&self, key: Key, replacement: Option<&AnyArc>, listen: Option<&ListenHook>) {
        let (consumers, stale) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            let consumers: Vec<ConsumerId> = state
                .observations
                .keys()
                .filter(|(_, k)| *k == key)
                .map(|(id, _)| *id)
                .collect();
            let mut stale = Vec::with_capacity(consumers.len());
            for id in &consumers {
                state.mark_changed(*id, key);
                if let Some(observation) = state.observations.get_mut(&(*id, key)) {
                    stale.extend(observation.subscription.take());
                    observation.notifier = match replacement {
                        Some(instance) => Arc::downgrade(instance),
                        None => {
                            let gone: Weak<dyn Any + Send + Sync> = Weak::<()>::new();
                            gone
                        }
                    };
                }
            }
            (consumers, stale)
        };
        drop(stale);

        let (Some(instance), Some(hook)) = (replacement, listen) else {
            return;
        };
        let fresh: Vec<(ConsumerId, Option<Subscription>)> = consumers
            .into_iter()
            .map(|id| (id, hook(instance, self.change_callback(id, key))))
            .collect();
        let mut orphaned = Vec::new();
        {
            let mut state = self.state.lock();
            let closed = state.closed;
            for (id, subscription) in fresh {
                match state.observations.get_mut(&(id, key)) {
                    Some(observation) if !closed => observation.subscription = subscription,
                    _ => orphaned.extend(subscription),
                }
            }
        }
        drop(orphaned);
    }

    /// Delivers one re-notification per dirty consumer and prunes
    /// observations of dropped consumers. Returns how many were delivered.
    pub(crate) fn tick(&self) -> usize {
        deliver(self.drain())
    }

    /// Takes the dirty set without notifying anyone, pruning observations
    /// of dropped consumers on the way.
    pub(crate) fn drain(&self) -> Vec<Pending> {
        let (dirty, pruned) = {
            let mut state = self.state.lock();
            let dirty = std::mem::take(&mut state.dirty);
            let dead: Vec<(ConsumerId, Key)> = state
                .observations
                .iter()
                .filter(|(_, o)| o.rebuild.strong_count() == 0)
                .map(|(k, _)| *k)
                .collect();
            let pruned: Vec<Observation> = dead.iter().filter_map(|k| state.observations.remove(k)).collect();
            (dirty, pruned)
        };
        drop(pruned);
        dirty.into_values().collect()
    }

    /// Ends every observation held for `consumer`.
    pub(crate) fn unwatch(&self, consumer: &Consumer) {
        let removed: Vec<Observation> = {
            let mut state = self.state.lock();
            let keys: Vec<(ConsumerId, Key)> =
                state.observations.keys().filter(|(id, _)| *id == consumer.id).copied().collect();
            state.dirty.remove(&consumer.id);
            keys.iter().filter_map(|k| state.observations.remove(k)).collect()
        };
        drop(removed);
    }

    /// Drops every observation and pending notification; later calls are no-ops.
    pub(crate) fn clear(&self) {
        let observations = {
            let mut state = self.state.lock();
            state.closed = true;
            state.dirty.clear();
            std::mem::take(&mut state.observations)
        };
        drop(observations);
    }

    pub(crate) fn is_watching(&self, consumer: &Consumer, key: Key) -> bool {
        self.state.lock().observations.contains_key(&(consumer.id, key))
    }

    /// Number of consumers currently watching `key`.
    pub(crate) fn watchers_of(&self, key: Key) -> usize {
        self.state.lock().observations.keys().filter(|(_, k)| *k == key).count()
    }

    pub(crate) fn observation_count(&self) -> usize {
        self.state.lock().observations.len()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.state.lock().dirty.len()
    }
}
