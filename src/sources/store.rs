//! Live settings stores that hand out snapshots and notify on change.

use crate::core::settings::key_matches_prefix;
use crate::core::{SecureString, SettingsSnapshot};
use crate::error::Result;
use crate::notify::{ChangeEvent, ChangeKind, ListenerRegistry, SettingChange, SubscriptionHandle};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Callback invoked with each batch of changes under a subscribed prefix.
pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// A source of live settings.
///
/// Implement this trait to back a notification service with a custom settings
/// system (a cluster settings service, a key-value store, ...).
pub trait SettingsStore: Send + Sync + 'static {
    /// Read every current entry under `prefix`, plain and secure.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot produce a snapshot.
    fn snapshot(&self, prefix: &str) -> Result<SettingsSnapshot>;

    /// Register `listener` for changes under `prefix`.
    ///
    /// Implementations must deliver batches one at a time, and must invoke the
    /// listener after the change is visible through [`snapshot`](Self::snapshot).
    fn subscribe(&self, prefix: &str, listener: ChangeListener) -> SubscriptionHandle;
}

/// A batch of setting mutations applied with a single change notification.
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::sources::{DynamicSettings, SettingsUpdate};
///
/// let store = DynamicSettings::new();
/// let changed = store.apply(
///     SettingsUpdate::new()
///         .set("notification.slack.default_account", "ops")
///         .set_secure("notification.slack.account.ops.secure_url", "https://hooks.example.com/x"),
/// );
/// assert_eq!(changed, 2);
/// ```
#[derive(Debug, Default)]
pub struct SettingsUpdate {
    plain: Vec<(String, Option<String>)>,
    secure: Vec<(String, Option<SecureString>)>,
}

impl SettingsUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain setting.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.plain.push((key.into(), Some(value.into())));
        self
    }

    /// Remove a plain setting.
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.plain.push((key.into(), None));
        self
    }

    /// Set a secure setting.
    pub fn set_secure(mut self, key: impl Into<String>, value: impl Into<SecureString>) -> Self {
        self.secure.push((key.into(), Some(value.into())));
        self
    }

    /// Remove a secure setting.
    pub fn remove_secure(mut self, key: impl Into<String>) -> Self {
        self.secure.push((key.into(), None));
        self
    }

    /// Whether the update holds no mutations.
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.secure.is_empty()
    }
}

#[derive(Default)]
struct Entries {
    plain: BTreeMap<String, String>,
    secure: BTreeMap<String, SecureString>,
}

/// In-memory settings store with plain and write-only secure entries.
///
/// Writes are applied under a lock, then listeners whose prefix matches a changed
/// key are notified once per write. Secure values can be set and removed but are
/// never readable through this type; they only reach account factories through
/// [`SettingsStore::snapshot`].
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::sources::{DynamicSettings, SettingsStore};
///
/// let store = DynamicSettings::new();
/// store.put("notification.slack.default_account", "ops");
///
/// let snapshot = store.snapshot("notification.slack").unwrap();
/// assert_eq!(snapshot.get("notification.slack.default_account"), Some("ops"));
/// ```
pub struct DynamicSettings {
    entries: RwLock<Entries>,
    listeners: ListenerRegistry,
}

impl DynamicSettings {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Set one plain setting.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.apply(SettingsUpdate::new().set(key, value)) > 0
    }

    /// Set one secure setting.
    pub fn put_secure(&self, key: impl Into<String>, value: impl Into<SecureString>) -> bool {
        self.apply(SettingsUpdate::new().set_secure(key, value)) > 0
    }

    /// Remove one plain setting.
    pub fn remove(&self, key: impl Into<String>) -> bool {
        self.apply(SettingsUpdate::new().remove(key)) > 0
    }

    /// Remove one secure setting.
    pub fn remove_secure(&self, key: impl Into<String>) -> bool {
        self.apply(SettingsUpdate::new().remove_secure(key)) > 0
    }

    /// Read a plain setting.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().plain.get(key).cloned()
    }

    /// Whether a secure setting is present.
    pub fn has_secure(&self, key: &str) -> bool {
        self.entries.read().secure.contains_key(key)
    }

    /// Apply a batch of mutations and notify listeners once.
    ///
    /// Mutations that don't change anything (setting an identical value, removing
    /// an absent key) are dropped. Returns the number of keys that changed.
    pub fn apply(&self, update: SettingsUpdate) -> usize {
        let event = {
            let mut entries = self.entries.write();
            let mut changes = BTreeMap::new();

            for (key, value) in update.plain {
                if let Some(change) = apply_plain(&mut entries.plain, key, value) {
                    changes.insert((change.key.clone(), false), change);
                }
            }
            for (key, value) in update.secure {
                if let Some(change) = apply_secure(&mut entries.secure, key, value) {
                    changes.insert((change.key.clone(), true), change);
                }
            }

            ChangeEvent {
                changes: changes.into_values().collect(),
            }
        };

        self.dispatch(event)
    }

    /// Replace every plain setting with `settings`, leaving secure settings untouched.
    ///
    /// Used by loaders that own the plain namespace, such as a watched settings file.
    /// Returns the number of keys that changed.
    pub fn replace_plain(&self, settings: BTreeMap<String, String>) -> usize {
        let event = {
            let mut entries = self.entries.write();
            let mut changes = Vec::new();

            for (key, old) in &entries.plain {
                if !settings.contains_key(key) {
                    changes.push(SettingChange {
                        key: key.clone(),
                        kind: ChangeKind::Removed,
                        old: Some(old.clone()),
                        new: None,
                        secure: false,
                    });
                }
            }
            for (key, new) in &settings {
                match entries.plain.get(key) {
                    Some(old) if old == new => {}
                    old => changes.push(SettingChange {
                        key: key.clone(),
                        kind: if old.is_some() {
                            ChangeKind::Updated
                        } else {
                            ChangeKind::Added
                        },
                        old: old.cloned(),
                        new: Some(new.clone()),
                        secure: false,
                    }),
                }
            }

            entries.plain = settings;
            changes.sort_by(|a, b| a.key.cmp(&b.key));
            ChangeEvent { changes }
        };

        self.dispatch(event)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.listener_count()
    }

    fn dispatch(&self, event: ChangeEvent) -> usize {
        let changed = event.changes.len();
        if changed > 0 {
            tracing::debug!(changed, "settings changed, notifying listeners");
            self.listeners.notify(&event);
        }
        changed
    }
}

fn apply_plain(
    entries: &mut BTreeMap<String, String>,
    key: String,
    value: Option<String>,
) -> Option<SettingChange> {
    let old = match value {
        Some(new) => {
            if entries.get(&key) == Some(&new) {
                return None;
            }
            entries.insert(key.clone(), new)
        }
        None => Some(entries.remove(&key)?),
    };
    let new = entries.get(&key).cloned();

    Some(SettingChange {
        kind: match (&old, &new) {
            (None, _) => ChangeKind::Added,
            (Some(_), Some(_)) => ChangeKind::Updated,
            (Some(_), None) => ChangeKind::Removed,
        },
        key,
        old,
        new,
        secure: false,
    })
}

fn apply_secure(
    entries: &mut BTreeMap<String, SecureString>,
    key: String,
    value: Option<SecureString>,
) -> Option<SettingChange> {
    let kind = match value {
        Some(new) => {
            if entries.get(&key) == Some(&new) {
                return None;
            }
            match entries.insert(key.clone(), new) {
                Some(_) => ChangeKind::Updated,
                None => ChangeKind::Added,
            }
        }
        None => {
            entries.remove(&key)?;
            ChangeKind::Removed
        }
    };

    Some(SettingChange {
        key,
        kind,
        old: None,
        new: None,
        secure: true,
    })
}

impl Default for DynamicSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for DynamicSettings {
    fn snapshot(&self, prefix: &str) -> Result<SettingsSnapshot> {
        let entries = self.entries.read();
        let mut snapshot = SettingsSnapshot::new(prefix);

        for (key, value) in entries.plain.iter().filter(|(key, _)| key_matches_prefix(key, prefix)) {
            snapshot.insert(key.clone(), value.clone());
        }
        for (key, value) in entries.secure.iter().filter(|(key, _)| key_matches_prefix(key, prefix)) {
            snapshot.insert_secure(key.clone(), value.clone());
        }

        Ok(snapshot)
    }

    fn subscribe(&self, prefix: &str, listener: ChangeListener) -> SubscriptionHandle {
        self.listeners.subscribe(prefix, listener)
    }
}
