//! File-based settings source.

use super::SettingsSource;
use super::settings_source::flatten_table;
use crate::error::{AccountError, Result};
use config::File;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// File-based settings source.
///
/// Loads settings from YAML, TOML, or JSON files with automatic format detection
/// based on file extension, and flattens nested tables into dotted keys.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_accounts::sources::FileSource;
///
/// let source = FileSource::new("settings/notifications.yaml");
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
}

impl FileSource {
    /// Create a new file source with automatic format detection.
    ///
    /// The format is detected from the file extension:
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this source.
    ///
    /// Higher priority sources override lower priority ones.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate that the file extension is supported.
    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                AccountError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        let (feature, enabled) = match extension {
            "yaml" | "yml" => ("yaml", cfg!(feature = "yaml")),
            "toml" => ("toml", cfg!(feature = "toml")),
            "json" => ("json", cfg!(feature = "json")),
            _ => {
                return Err(AccountError::LoadError(format!(
                    "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                    extension
                )));
            }
        };
        if !enabled {
            return Err(AccountError::LoadError(format!(
                "Support for .{} files requires the `{}` feature",
                extension, feature
            )));
        }
        Ok(())
    }
}

impl SettingsSource for FileSource {
    fn load(&self) -> Result<BTreeMap<String, String>> {
        self.validate_extension()?;

        if !self.path.exists() {
            return Err(AccountError::LoadError(format!(
                "Settings file not found: {}",
                self.path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(File::from(self.path.clone()).required(true))
            .build()
            .map_err(|e| AccountError::ParseError(format!("Failed to load file: {}", e)))?;

        let table = settings
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| AccountError::ParseError(format!("Failed to parse file: {}", e)))?;

        flatten_table(table)
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
