//! # hotswap-accounts
//!
//! Hot-reloadable notification account registries with lock-free reads.
//!
//! ## Overview
//!
//! A notification channel (Slack, email, ...) is configured with any number of
//! named accounts under a settings prefix:
//!
//! ```text
//! notification.slack.default_account = ops
//! notification.slack.account.ops.secure_url = ...
//! notification.slack.account.dev.url = ...
//! ```
//!
//! `hotswap-accounts` keeps the parsed accounts for one channel in an
//! [`AccountRegistry`](core::AccountRegistry):
//! - Lock-free reads using `arc-swap`; a reload publishes the whole account set at once
//! - Invalid accounts are skipped with a warning, the rest still load
//! - Empty account names resolve to the configured default account
//! - Settings changes under the prefix trigger a reload automatically
//!
//! ## Quick Start
//!
//! ```rust
//! use hotswap_accounts::prelude::*;
//! use hotswap_accounts::slack::SlackAccountFactory;
//! use std::sync::Arc;
//!
//! # fn example() -> hotswap_accounts::error::Result<()> {
//! let store = Arc::new(DynamicSettings::new());
//! store.put_secure("notification.slack.account.ops.secure_url", "https://hooks.example.com/ops");
//! store.put("notification.slack.default_account", "ops");
//!
//! let service = NotificationService::new(SlackAccountFactory, Arc::clone(&store))?;
//! let account = service.resolve("")?;
//! assert_eq!(account.name(), "ops");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): reload settings files on change
//! - `slack` (default): Slack webhook accounts
//! - `yaml`, `toml`, `json`, `all-formats` (default): settings file formats
//! - `metrics`: OpenTelemetry reload metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "slack")]
pub mod slack;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        Account, AccountFactory, AccountRegistry, AccountSettings, NotificationService,
        NotificationServiceBuilder, ServiceState, SettingsSnapshot, factory_fn,
    };
    pub use crate::error::{AccountError, Result, ValidationError};
    pub use crate::sources::{DynamicSettings, SettingsLoader, SettingsStore};
}
