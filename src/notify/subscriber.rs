//! Prefix-scoped change listeners for settings stores.

use crate::core::settings::key_matches_prefix;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::{Arc, Weak};

/// What happened to a single setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The key did not exist before.
    Added,
    /// The key existed and now has a different value.
    Updated,
    /// The key was removed.
    Removed,
}

/// A change to one setting.
///
/// For secure settings `old` and `new` are always `None`; only the fact that the
/// key changed is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    /// Full dotted key
    pub key: String,
    /// Kind of change
    pub kind: ChangeKind,
    /// Previous plain value
    pub old: Option<String>,
    /// New plain value
    pub new: Option<String>,
    /// Whether the key lives in the secure store
    pub secure: bool,
}

/// One batch of setting changes, delivered to each matching listener at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Changes in this batch, in key order
    pub changes: Vec<SettingChange>,
}

impl ChangeEvent {
    /// The subset of changes under `prefix`.
    pub fn filtered(&self, prefix: &str) -> ChangeEvent {
        ChangeEvent {
            changes: self
                .changes
                .iter()
                .filter(|change| key_matches_prefix(&change.key, prefix))
                .cloned()
                .collect(),
        }
    }

    /// Whether the batch holds no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Keys touched by this batch.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|change| change.key.as_str())
    }
}

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle for a listener registration; dropping it unregisters the listener.
#[must_use = "dropping the handle unregisters the listener"]
pub struct SubscriptionHandle {
    id: usize,
    registry: Weak<Mutex<ListenerRegistryInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            let id = self.id;
            inner.lock().listeners.retain(|entry| entry.id != id);
        }
    }
}

struct ListenerEntry {
    id: usize,
    prefix: String,
    callback: Listener,
}

struct ListenerRegistryInner {
    listeners: Vec<ListenerEntry>,
    next_id: usize,
}

/// Registry of change listeners, each scoped to a key prefix.
///
/// Dispatch is serialized: at most one batch is delivered at a time, and a
/// listener sees a batch only if at least one changed key lies under its prefix.
/// Callbacks run outside the registration lock, so a listener may read from the
/// store that notified it.
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::notify::{ChangeEvent, ChangeKind, ListenerRegistry, SettingChange};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let registry = ListenerRegistry::new();
/// let calls = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&calls);
/// let handle = registry.subscribe("notification.slack", move |_event| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// registry.notify(&ChangeEvent {
///     changes: vec![SettingChange {
///         key: "notification.slack.default_account".into(),
///         kind: ChangeKind::Added,
///         old: None,
///         new: Some("ops".into()),
///         secure: false,
///     }],
/// });
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
///
/// drop(handle);
/// assert_eq!(registry.listener_count(), 0);
/// ```
pub struct ListenerRegistry {
    inner: Arc<Mutex<ListenerRegistryInner>>,
    dispatch: ReentrantMutex<()>,
}

impl ListenerRegistry {
    /// Create an empty listener registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerRegistryInner {
                listeners: Vec::new(),
                next_id: 0,
            })),
            dispatch: ReentrantMutex::new(()),
        }
    }

    /// Register `callback` for changes under `prefix`.
    ///
    /// An empty prefix matches every key.
    pub fn subscribe<F>(&self, prefix: impl Into<String>, callback: F) -> SubscriptionHandle
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(ListenerEntry {
            id,
            prefix: prefix.into(),
            callback: Arc::new(callback),
        });

        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every listener whose prefix matches a changed key.
    ///
    /// Each listener receives only the changes under its own prefix, once per call.
    /// Returns the number of listeners invoked.
    pub fn notify(&self, event: &ChangeEvent) -> usize {
        let _dispatching = self.dispatch.lock();

        let targets: Vec<(String, Listener)> = {
            let inner = self.inner.lock();
            inner
                .listeners
                .iter()
                .map(|entry| (entry.prefix.clone(), Arc::clone(&entry.callback)))
                .collect()
        };

        let mut invoked = 0;
        for (prefix, callback) in targets {
            let scoped = event.filtered(&prefix);
            if scoped.is_empty() {
                continue;
            }
            callback(&scoped);
            invoked += 1;
        }
        invoked
    }

    /// Get the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn change(key: &str) -> SettingChange {
        SettingChange {
            key: key.to_string(),
            kind: ChangeKind::Updated,
            old: Some("old".into()),
            new: Some("new".into()),
            secure: false,
        }
    }

    fn event(keys: &[&str]) -> ChangeEvent {
        ChangeEvent {
            changes: keys.iter().map(|key| change(key)).collect(),
        }
    }

    #[test]
    fn test_subscribe_and_notify() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let _handle = registry.subscribe("notification.slack", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&event(&["notification.slack.default_account"]));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        registry.notify(&event(&["notification.slack.account.ops.url"]));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_one_call_per_batch() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let _handle = registry.subscribe("notification.slack", move |event| {
            assert_eq!(event.changes.len(), 2);
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&event(&[
            "notification.slack.account.a.url",
            "notification.slack.account.b.url",
            "notification.email.account.c.host",
        ]));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prefix_filtering() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let _handle = registry.subscribe("notification.slack", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let invoked = registry.notify(&event(&[
            "notification.email.account.a.host",
            "notification.slacker.default_account",
        ]));
        assert_eq!(invoked, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let handle = registry.subscribe("", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&event(&["a.b"]));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        drop(handle);

        registry.notify(&event(&["a.b"]));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_count() {
        let registry = ListenerRegistry::new();
        assert_eq!(registry.listener_count(), 0);

        let handle1 = registry.subscribe("a", |_| {});
        assert_eq!(registry.listener_count(), 1);

        let _handle2 = registry.subscribe("b", |_| {});
        assert_eq!(registry.listener_count(), 2);

        drop(handle1);
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn test_handle_outlives_registry() {
        let registry = ListenerRegistry::new();
        let handle = registry.subscribe("a", |_| {});
        drop(registry);
        drop(handle);
    }

    #[test]
    fn test_filtered_event_keys() {
        let scoped = event(&["a.x", "b.y", "a.z"]).filtered("a");
        let keys: Vec<&str> = scoped.keys().collect();
        assert_eq!(keys, vec!["a.x", "a.z"]);
    }
}
