//! Settings snapshots and per-account settings subtrees.

use crate::error::{AccountError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Key segment holding the default account name: `<prefix>.default_account`.
pub const DEFAULT_ACCOUNT_KEY: &str = "default_account";

/// Key segment grouping accounts: `<prefix>.account.<name>.<field>`.
pub const ACCOUNT_GROUP_KEY: &str = "account";

/// A secret setting value.
///
/// `Debug` and `Display` never print the content; call [`SecureString::expose`]
/// to read it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureString(Box<str>);

impl SecureString {
    /// Create a secure string from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().into_boxed_str())
    }

    /// Read the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString(***)")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Check that a settings prefix is a non-empty dotted path without empty segments.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(AccountError::MalformedSnapshot(
            "settings prefix must not be empty".to_string(),
        ));
    }

    if prefix
        .split('.')
        .any(|segment| segment.is_empty() || segment.chars().any(char::is_whitespace))
    {
        return Err(AccountError::MalformedSnapshot(format!(
            "settings prefix '{}' is not a valid dotted path",
            prefix
        )));
    }

    Ok(())
}

/// Whether `key` lies under `prefix` (the prefix itself or `prefix.` anything).
pub(crate) fn key_matches_prefix(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match key.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// A complete, point-in-time read of every setting under one prefix.
///
/// Keys are full dotted keys (`notification.slack.account.ops.url`). Plain and
/// secure entries are kept apart so secrets never end up in logs.
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::core::SettingsSnapshot;
///
/// let snapshot = SettingsSnapshot::new("notification.slack")
///     .with_setting("notification.slack.default_account", "ops")
///     .with_secure_setting("notification.slack.account.ops.secure_url", "https://hooks.example.com/x");
///
/// let grouped = snapshot.group().unwrap();
/// assert_eq!(grouped.default_account.as_deref(), Some("ops"));
/// assert!(grouped.accounts.contains_key("ops"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsSnapshot {
    prefix: String,
    settings: BTreeMap<String, String>,
    secure: BTreeMap<String, SecureString>,
}

impl SettingsSnapshot {
    /// Create an empty snapshot for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            settings: BTreeMap::new(),
            secure: BTreeMap::new(),
        }
    }

    /// Add a plain setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a secure setting.
    pub fn with_secure_setting(
        mut self,
        key: impl Into<String>,
        value: impl Into<SecureString>,
    ) -> Self {
        self.insert_secure(key, value);
        self
    }

    /// Insert a plain setting, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    /// Insert a secure setting, replacing any previous value.
    pub fn insert_secure(&mut self, key: impl Into<String>, value: impl Into<SecureString>) {
        self.secure.insert(key.into(), value.into());
    }

    /// The prefix this snapshot was taken under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Look up a plain setting by full key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Total number of entries, plain and secure.
    pub fn len(&self) -> usize {
        self.settings.len() + self.secure.len()
    }

    /// Whether the snapshot has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split the flat entries into the default account name and per-account subtrees.
    ///
    /// Entries outside `<prefix>.default_account` and `<prefix>.account.<name>.<field>`
    /// are ignored, as are account entries whose name or field segment is empty.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::MalformedSnapshot`] if the snapshot's prefix is not
    /// a valid dotted path.
    pub fn group(&self) -> Result<GroupedSettings> {
        validate_prefix(&self.prefix)?;

        let default_key = format!("{}.{}", self.prefix, DEFAULT_ACCOUNT_KEY);
        let account_root = format!("{}.{}.", self.prefix, ACCOUNT_GROUP_KEY);

        let mut grouped = GroupedSettings::default();

        for (key, value) in &self.settings {
            if *key == default_key {
                let name = value.trim();
                if !name.is_empty() {
                    grouped.default_account = Some(name.to_string());
                }
                continue;
            }

            match split_account_key(key, &account_root) {
                Some((name, field)) => {
                    grouped
                        .accounts
                        .entry(name.to_string())
                        .or_default()
                        .settings
                        .insert(field.to_string(), value.clone());
                }
                None => {
                    tracing::debug!(key = %key, "ignoring setting outside the account namespace");
                    grouped.ignored += 1;
                }
            }
        }

        for (key, value) in &self.secure {
            match split_account_key(key, &account_root) {
                Some((name, field)) => {
                    grouped
                        .accounts
                        .entry(name.to_string())
                        .or_default()
                        .secure
                        .insert(field.to_string(), value.clone());
                }
                None => {
                    tracing::debug!(key = %key, "ignoring secure setting outside the account namespace");
                    grouped.ignored += 1;
                }
            }
        }

        Ok(grouped)
    }
}

/// Isolate `<name>` and `<field>` from `<account_root><name>.<field>`.
fn split_account_key<'a>(key: &'a str, account_root: &str) -> Option<(&'a str, &'a str)> {
    let rest = key.strip_prefix(account_root)?;
    let (name, field) = rest.split_once('.')?;
    if name.is_empty() || field.is_empty() {
        return None;
    }
    Some((name, field))
}

/// A snapshot split into its default account name and per-account subtrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedSettings {
    /// The configured default account name, if set and non-blank
    pub default_account: Option<String>,
    /// Settings subtree for each account name
    pub accounts: BTreeMap<String, AccountSettings>,
    /// Number of entries that could not be attributed to an account
    pub ignored: usize,
}

/// The settings subtree of one account, keyed relative to the account.
///
/// For `notification.slack.account.ops.message_defaults.from`, the field is
/// `message_defaults.from`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSettings {
    settings: BTreeMap<String, String>,
    secure: BTreeMap<String, SecureString>,
}

impl AccountSettings {
    /// Create an empty subtree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain field.
    pub fn with_setting(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(field.into(), value.into());
        self
    }

    /// Add a secure field.
    pub fn with_secure_setting(
        mut self,
        field: impl Into<String>,
        value: impl Into<SecureString>,
    ) -> Self {
        self.secure.insert(field.into(), value.into());
        self
    }

    /// Read a plain field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.settings.get(field).map(String::as_str)
    }

    /// Read a secure field.
    pub fn get_secure(&self, field: &str) -> Option<&SecureString> {
        self.secure.get(field)
    }

    /// Whether the field is present as either a plain or a secure value.
    pub fn contains(&self, field: &str) -> bool {
        self.settings.contains_key(field) || self.secure.contains_key(field)
    }

    /// The nested subtree under `name.`, with that segment stripped.
    pub fn group(&self, name: &str) -> AccountSettings {
        let root = format!("{}.", name);
        let strip = |key: &String| key.strip_prefix(&root).map(str::to_string);

        AccountSettings {
            settings: self
                .settings
                .iter()
                .filter_map(|(key, value)| strip(key).map(|field| (field, value.clone())))
                .collect(),
            secure: self
                .secure
                .iter()
                .filter_map(|(key, value)| strip(key).map(|field| (field, value.clone())))
                .collect(),
        }
    }

    /// All field names, plain and secure, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let mut fields: Vec<&str> = self
            .settings
            .keys()
            .chain(self.secure.keys())
            .map(String::as_str)
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields.into_iter()
    }

    /// Whether the subtree has no fields.
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.secure.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "notification.slack";

    #[test]
    fn test_secure_string_is_redacted() {
        let secret = SecureString::from("https://hooks.example.com/T000/B000/XXXX");
        assert_eq!(format!("{:?}", secret), "SecureString(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "https://hooks.example.com/T000/B000/XXXX");
    }

    #[test]
    fn test_group_accounts_and_default() {
        let snapshot = SettingsSnapshot::new(PREFIX)
            .with_setting("notification.slack.default_account", "ops")
            .with_setting("notification.slack.account.ops.url", "https://a.example.com")
            .with_setting("notification.slack.account.ops.message_defaults.from", "bot")
            .with_secure_setting("notification.slack.account.dev.secure_url", "https://b.example.com");

        let grouped = snapshot.group().unwrap();
        assert_eq!(grouped.default_account.as_deref(), Some("ops"));
        assert_eq!(grouped.accounts.len(), 2);

        let ops = &grouped.accounts["ops"];
        assert_eq!(ops.get("url"), Some("https://a.example.com"));
        assert_eq!(ops.get("message_defaults.from"), Some("bot"));

        let dev = &grouped.accounts["dev"];
        assert!(dev.contains("secure_url"));
        assert!(dev.get("secure_url").is_none());
    }

    #[test]
    fn test_unattributable_keys_are_ignored() {
        let snapshot = SettingsSnapshot::new(PREFIX)
            .with_setting("notification.slack.account.ops", "no field")
            .with_setting("notification.slack.account..url", "no name")
            .with_setting("notification.slack.account.ops.", "empty field")
            .with_setting("notification.slack.unrelated", "x")
            .with_setting("notification.email.account.ops.url", "other prefix");

        let grouped = snapshot.group().unwrap();
        assert!(grouped.accounts.is_empty());
        assert_eq!(grouped.ignored, 5);
    }

    #[test]
    fn test_blank_default_is_unset() {
        let snapshot =
            SettingsSnapshot::new(PREFIX).with_setting("notification.slack.default_account", "  ");
        assert_eq!(snapshot.group().unwrap().default_account, None);
    }

    #[test]
    fn test_malformed_prefix_fails() {
        for prefix in ["", "notification..slack", ".slack", "notification.slack.", "a b"] {
            let result = SettingsSnapshot::new(prefix).group();
            assert!(
                matches!(result, Err(AccountError::MalformedSnapshot(_))),
                "prefix {:?} should be rejected",
                prefix
            );
        }
    }

    #[test]
    fn test_account_settings_group() {
        let settings = AccountSettings::new()
            .with_setting("url", "https://a.example.com")
            .with_setting("message_defaults.from", "bot")
            .with_setting("message_defaults.icon", ":robot:")
            .with_secure_setting("message_defaults.token", "secret");

        let defaults = settings.group("message_defaults");
        assert_eq!(defaults.get("from"), Some("bot"));
        assert_eq!(defaults.get("icon"), Some(":robot:"));
        assert!(defaults.get_secure("token").is_some());
        assert!(!defaults.contains("url"));
    }

    #[test]
    fn test_fields_are_sorted_and_unique() {
        let settings = AccountSettings::new()
            .with_setting("url", "x")
            .with_secure_setting("url", "y")
            .with_setting("a", "z");
        let fields: Vec<&str> = settings.fields().collect();
        assert_eq!(fields, vec!["a", "url"]);
    }

    #[test]
    fn test_key_matches_prefix() {
        assert!(key_matches_prefix("notification.slack.default_account", PREFIX));
        assert!(key_matches_prefix("notification.slack", PREFIX));
        assert!(!key_matches_prefix("notification.slacker.x", PREFIX));
        assert!(key_matches_prefix("anything", ""));
    }
}
