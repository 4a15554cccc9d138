//! Settings source trait and value flattening.

use crate::core::DEFAULT_ACCOUNT_KEY;
use crate::error::{AccountError, Result};
use std::collections::{BTreeMap, HashMap};

/// Trait for sources of flat settings.
///
/// Implement this trait to load settings from somewhere other than files or
/// environment variables. Keys are full dotted keys such as
/// `notification.slack.account.ops.url`.
pub trait SettingsSource: Send + Sync {
    /// Load settings as a flat key-value map.
    ///
    /// The returned map will be merged with other sources according to precedence rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be loaded or parsed.
    fn load(&self) -> Result<BTreeMap<String, String>>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;

    /// Get the priority of this source (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Later files: 110, 120, ...
    /// - First file: 100
    fn priority(&self) -> i32 {
        100
    }
}

/// Flatten a nested `config` table into dotted keys with string values.
///
/// Arrays of scalars become comma-separated lists; nil values are dropped.
/// Keys are lowercased, as `config` already does for some sources, and so is
/// every `default_account` value, since it names a lowercased key segment.
pub(crate) fn flatten_table(table: HashMap<String, config::Value>) -> Result<BTreeMap<String, String>> {
    let mut flat = BTreeMap::new();
    for (key, value) in table {
        flatten_value(&key.to_lowercase(), value, &mut flat)?;
    }

    for (key, value) in flat.iter_mut() {
        if names_account(key) {
            *value = value.to_lowercase();
        }
    }
    Ok(flat)
}

fn names_account(key: &str) -> bool {
    key.rsplit('.').next() == Some(DEFAULT_ACCOUNT_KEY)
}

fn flatten_value(key: &str, value: config::Value, out: &mut BTreeMap<String, String>) -> Result<()> {
    match value.kind {
        config::ValueKind::Nil => {}
        config::ValueKind::Table(table) => {
            for (child, value) in table {
                flatten_value(&format!("{}.{}", key, child.to_lowercase()), value, out)?;
            }
        }
        config::ValueKind::Array(items) => {
            let items = items
                .into_iter()
                .map(|item| scalar_to_string(key, item))
                .collect::<Result<Vec<_>>>()?;
            out.insert(key.to_string(), items.join(","));
        }
        kind => {
            out.insert(key.to_string(), scalar_to_string(key, config::Value::new(None, kind))?);
        }
    }
    Ok(())
}

fn scalar_to_string(key: &str, value: config::Value) -> Result<String> {
    value.into_string().map_err(|e| {
        AccountError::ParseError(format!("Setting '{}' is not a scalar value: {}", key, e))
    })
}
