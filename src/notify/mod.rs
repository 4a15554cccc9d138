//! Settings change notification.
//!
//! Provides prefix-scoped change listeners and, with the `file-watch` feature,
//! file watching that pushes settings file edits into a live store.

pub mod subscriber;

#[cfg(feature = "file-watch")]
pub mod watcher;

pub use subscriber::{ChangeEvent, ChangeKind, ListenerRegistry, SettingChange, SubscriptionHandle};

#[cfg(feature = "file-watch")]
pub use watcher::SettingsWatcher;
