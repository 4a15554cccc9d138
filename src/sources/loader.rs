//! Settings loader that merges multiple sources into a live store.

use super::{DynamicSettings, EnvSource, FileSource, SettingsSource};
use crate::error::{AccountError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Loads and merges flat settings from multiple sources.
///
/// Sources are merged in priority order (lower priority first, higher priority
/// sources override). The merged result can be pushed into a [`DynamicSettings`]
/// store, which notifies listeners once for the whole batch.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_accounts::sources::{DynamicSettings, SettingsLoader};
///
/// # fn example() -> hotswap_accounts::error::Result<()> {
/// let loader = SettingsLoader::new()
///     .with_file("settings/notifications.yaml")
///     .with_env_overrides("APP", "__");
///
/// let store = DynamicSettings::new();
/// loader.apply_to(&store)?;
/// # Ok(())
/// # }
/// ```
pub struct SettingsLoader {
    sources: Vec<Box<dyn SettingsSource>>,
    file_paths: Vec<PathBuf>,
}

impl SettingsLoader {
    /// Create a new settings loader.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            file_paths: Vec::new(),
        }
    }

    /// Add a settings file; later files override earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let priority = 100 + (self.file_paths.len() as i32 * 10); // 100, 110, 120, etc.
        self.sources
            .push(Box::new(FileSource::new(&path).with_priority(priority)));
        self.file_paths.push(path);
        self
    }

    /// Add environment variable overrides (priority 300).
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.sources.push(Box::new(EnvSource::new(prefix, separator)));
        self
    }

    /// Add a custom settings source.
    pub fn with_source<S: SettingsSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Add a boxed settings source.
    pub fn add_source(&mut self, source: Box<dyn SettingsSource>) {
        self.sources.push(source);
    }

    /// Settings files added through [`with_file`](Self::with_file), in order.
    pub fn file_paths(&self) -> &[PathBuf] {
        &self.file_paths
    }

    /// Load and merge settings from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if no sources are configured or any source fails to load.
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        if self.sources.is_empty() {
            return Err(AccountError::LoadError(
                "No settings sources specified".to_string(),
            ));
        }

        let mut sorted_sources: Vec<_> = self.sources.iter().collect();
        sorted_sources.sort_by_key(|s| s.priority());

        let mut merged = BTreeMap::new();
        for source in sorted_sources {
            let values = source.load().map_err(|e| {
                AccountError::LoadError(format!("Failed to load source '{}': {}", source.name(), e))
            })?;
            tracing::debug!(source = %source.name(), entries = values.len(), "loaded settings source");
            merged.extend(values);
        }

        Ok(merged)
    }

    /// Load all sources and replace the plain settings of `store` with the result.
    ///
    /// Nothing is written if loading fails, so the store keeps its last good
    /// settings. Returns the number of keys that changed.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails.
    pub fn apply_to(&self, store: &DynamicSettings) -> Result<usize> {
        let settings = self.load()?;
        Ok(store.replace_plain(settings))
    }

    /// Get the list of source names in priority order.
    pub fn source_names(&self) -> Vec<String> {
        let mut sorted_sources: Vec<_> = self.sources.iter().collect();
        sorted_sources.sort_by_key(|s| s.priority());
        sorted_sources.iter().map(|s| s.name()).collect()
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}
