//! Synchronous publish/subscribe for state snapshots.
//!
//! `Notifier` keeps an unordered set of listeners in a `DashMap`. Publishing
//! invokes every listener subscribed at the time of the call; nothing is
//! buffered for listeners that subscribe later. Cloning the notifier shares
//! the listener set.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

/// A subscribed callback.
pub type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Multi-listener, fire-and-forget state publisher.
pub struct Notifier<S> {
    listeners: Arc<DashMap<u64, Listener<S>>>,
    next_id: Arc<AtomicU64>,
}

impl<S: 'static> Notifier<S> {
    /// Create a notifier with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a listener. The returned handle removes exactly this listener.
    ///
    /// Dropping the handle does not unsubscribe.
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::new(listener));
        let listeners: Arc<dyn RemoveListener> = self.listeners.clone();
        Subscription {
            id,
            listeners: Arc::downgrade(&listeners),
        }
    }

    /// Invoke every current listener with `state`.
    ///
    /// Iteration order is unspecified. A panicking listener does not stop the
    /// remaining listeners from running; the first panic is resumed after all
    /// of them have been called.
    pub fn notify(&self, state: &S) {
        // Snapshot first: listeners may subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener<S>> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut first_panic = None;
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(state))) {
                first_panic.get_or_insert(payload);
            }
        }

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    /// Number of current listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl<S: 'static> Default for Notifier<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for Notifier<S> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<S> fmt::Debug for Notifier<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscriber_count", &self.listeners.len())
            .finish()
    }
}

trait RemoveListener: Send + Sync {
    fn remove_listener(&self, id: u64);
}

impl<S> RemoveListener for DashMap<u64, Listener<S>> {
    fn remove_listener(&self, id: u64) {
        self.remove(&id);
    }
}

/// Handle returned by [`Notifier::subscribe`].
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    listeners: Weak<dyn RemoveListener>,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove_listener(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &(self.listeners.strong_count() > 0))
            .finish()
    }
}
