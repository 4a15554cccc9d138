//! File watching for automatic settings reloads.

use crate::error::{AccountError, Result};
use crate::sources::{DynamicSettings, SettingsLoader};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Watches settings files and re-applies a [`SettingsLoader`] to a store on change.
///
/// Uses the `notify` crate to watch files and a tokio task to debounce bursts of
/// events into a single reload. Every reload replaces the store's plain settings,
/// which in turn notifies the store's listeners (and so reloads any account
/// registries wired to it). A reload that fails to load keeps the last good
/// settings.
///
/// Must be created from within a tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_accounts::notify::SettingsWatcher;
/// use hotswap_accounts::sources::{DynamicSettings, SettingsLoader};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> hotswap_accounts::error::Result<()> {
/// let store = Arc::new(DynamicSettings::new());
/// let loader = SettingsLoader::new().with_file("settings/notifications.yaml");
/// loader.apply_to(&store)?;
///
/// let watcher = SettingsWatcher::spawn(loader, Arc::clone(&store), Duration::from_millis(500))?;
/// watcher.watch_loader_files()?;
/// # Ok(())
/// # }
/// ```
pub struct SettingsWatcher {
    watcher: Mutex<RecommendedWatcher>,
    loader: Arc<SettingsLoader>,
    debounce_duration: Duration,
    watched_paths: Mutex<Vec<PathBuf>>,
    task: JoinHandle<()>,
}

impl SettingsWatcher {
    /// Start watching on behalf of `store`.
    ///
    /// No paths are watched yet; call [`watch`](Self::watch) or
    /// [`watch_loader_files`](Self::watch_loader_files).
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime or if the underlying
    /// file watcher cannot be created.
    pub fn spawn(
        loader: SettingsLoader,
        store: Arc<DynamicSettings>,
        debounce_duration: Duration,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AccountError::WatchError(format!("No tokio runtime available: {}", e)))?;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                // Only care about write/create/remove events
                if matches!(
                    event.kind,
                    notify::EventKind::Modify(_)
                        | notify::EventKind::Create(_)
                        | notify::EventKind::Remove(_)
                ) {
                    let _ = event_tx.send(event);
                }
            }
        })
        .map_err(|e| AccountError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        let loader = Arc::new(loader);
        let task_loader = Arc::clone(&loader);

        let task = runtime.spawn(async move {
            while let Some(event) = event_rx.recv().await {
                // Collapse the burst that usually accompanies a single save.
                sleep(debounce_duration).await;
                let mut coalesced = 1;
                while event_rx.try_recv().is_ok() {
                    coalesced += 1;
                }

                match task_loader.apply_to(&store) {
                    Ok(changed) => tracing::info!(
                        paths = ?event.paths,
                        events = coalesced,
                        changed,
                        "settings files reloaded"
                    ),
                    Err(err) => tracing::warn!(
                        paths = ?event.paths,
                        error = %err,
                        "settings reload failed, keeping previous settings"
                    ),
                }
            }
        });

        Ok(Self {
            watcher: Mutex::new(watcher),
            loader,
            debounce_duration,
            watched_paths: Mutex::new(Vec::new()),
            task,
        })
    }

    /// Add a path to watch for changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be watched (e.g., doesn't exist).
    pub fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let canonical_path = path
            .as_ref()
            .canonicalize()
            .map_err(|e| AccountError::WatchError(format!("Failed to resolve path: {}", e)))?;

        self.watcher
            .lock()
            .watch(&canonical_path, RecursiveMode::NonRecursive)
            .map_err(|e| AccountError::WatchError(format!("Failed to watch path: {}", e)))?;

        let mut paths = self.watched_paths.lock();
        if !paths.contains(&canonical_path) {
            paths.push(canonical_path);
        }

        Ok(())
    }

    /// Watch every file the loader reads.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the loader's files cannot be watched.
    pub fn watch_loader_files(&self) -> Result<()> {
        for path in self.loader.file_paths() {
            self.watch(path)?;
        }
        Ok(())
    }

    /// Stop watching a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be unwatched.
    pub fn unwatch(&self, path: impl AsRef<Path>) -> Result<()> {
        let canonical_path = path.as_ref().canonicalize().map_err(|e| {
            AccountError::WatchError(format!("Failed to resolve path for unwatching: {}", e))
        })?;

        self.watcher
            .lock()
            .unwatch(&canonical_path)
            .map_err(|e| AccountError::WatchError(format!("Failed to unwatch path: {}", e)))?;

        self.watched_paths.lock().retain(|p| p != &canonical_path);

        Ok(())
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }

    /// Get a list of currently watched paths.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths.lock().clone()
    }
}

impl Drop for SettingsWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
