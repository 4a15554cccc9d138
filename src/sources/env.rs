//! Environment variable settings source.

use super::SettingsSource;
use super::settings_source::flatten_table;
use crate::core::settings::key_matches_prefix;
use crate::error::{AccountError, Result};
use config::Environment;
use std::collections::{BTreeMap, HashMap};

/// Settings read from environment variables.
///
/// `<PREFIX>_` is stripped and `separator` splits the rest into key segments.
/// Keys are lowercased, so account names configured this way are lowercase too.
/// Secrets should not be passed this way; put them in the secure store instead.
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::sources::{EnvSource, SettingsSource};
/// use std::collections::HashMap;
///
/// let vars = HashMap::from([(
///     "APP_NOTIFICATION__SLACK__DEFAULT_ACCOUNT".to_string(),
///     "ops".to_string(),
/// )]);
/// let source = EnvSource::new("APP", "__").with_vars(vars);
///
/// let settings = source.load().unwrap();
/// assert_eq!(settings["notification.slack.default_account"], "ops");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    scope: Option<String>,
    vars: Option<HashMap<String, String>>,
    priority: i32,
}

impl EnvSource {
    /// Read variables named `<prefix>_<KEY>` with `separator` between key segments.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            scope: None,
            vars: None,
            priority: 300, // above every file
        }
    }

    /// Keep only keys under `scope` (e.g. `notification`).
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Read from `vars` instead of the process environment.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl SettingsSource for EnvSource {
    fn load(&self) -> Result<BTreeMap<String, String>> {
        let environment = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .source(self.vars.clone());

        let table = config::Config::builder()
            .add_source(environment)
            .build()
            .map_err(|e| AccountError::LoadError(format!("Failed to read environment: {}", e)))?
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| AccountError::ParseError(format!("Failed to parse environment: {}", e)))?;

        let mut settings = flatten_table(table)?;
        if let Some(scope) = &self.scope {
            settings.retain(|key, _| key_matches_prefix(key, scope));
        }
        Ok(settings)
    }

    fn name(&self) -> String {
        format!("env:{}_*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
