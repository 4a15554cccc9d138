//! Slack notification accounts.
//!
//! Accounts live under `notification.slack.account.<name>`:
//!
//! ```text
//! notification.slack.default_account = ops
//! notification.slack.account.ops.secure_url = https://hooks.slack.com/services/...   (secure)
//! notification.slack.account.ops.message_defaults.from = alert-bot
//! notification.slack.account.ops.message_defaults.to = #ops,#alerts
//! ```

mod account;

pub use account::{MESSAGE_DEFAULTS, SECURE_URL, SlackAccount, SlackAccountFactory, SlackMessageDefaults, URL};

use crate::core::NotificationService;
use crate::error::Result;
use crate::sources::SettingsStore;
use std::sync::Arc;

/// Settings prefix Slack accounts are read from.
pub const DEFAULT_PREFIX: &str = "notification.slack";

/// A notification service holding Slack accounts.
pub type SlackService<S> = NotificationService<SlackAccountFactory, S>;

/// Start a Slack service following `store` under [`DEFAULT_PREFIX`].
///
/// # Errors
///
/// Returns an error if the store cannot produce the initial snapshot.
pub fn service<S: SettingsStore>(store: Arc<S>) -> Result<SlackService<S>> {
    NotificationService::new(SlackAccountFactory, store)
}
