//! Slack webhook accounts.

use crate::core::{Account, AccountFactory, AccountSettings};
use crate::error::ValidationError;
use std::fmt;
use url::Url;

/// Deprecated plain webhook URL field.
pub const URL: &str = "url";

/// Webhook URL field read from the secure store.
pub const SECURE_URL: &str = "secure_url";

/// Group holding default message fields.
pub const MESSAGE_DEFAULTS: &str = "message_defaults";

const DEPRECATED_PLAIN_URL: &[&str] = &[URL];

/// Default fields applied to messages sent through an account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackMessageDefaults {
    /// Sender name
    pub from: Option<String>,
    /// Channels or users to post to
    pub to: Vec<String>,
    /// Icon shown next to the message
    pub icon: Option<String>,
    /// Message text
    pub text: Option<String>,
}

impl SlackMessageDefaults {
    fn from_settings(settings: &AccountSettings) -> Result<Self, ValidationError> {
        let to = match settings.get("to") {
            None => Vec::new(),
            Some(raw) => {
                let to: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|recipient| !recipient.is_empty())
                    .map(str::to_string)
                    .collect();
                if to.is_empty() {
                    return Err(ValidationError::invalid_field(
                        format!("{}.to", MESSAGE_DEFAULTS),
                        "must name at least one channel or user",
                    ));
                }
                to
            }
        };

        Ok(Self {
            from: settings.get("from").map(str::to_string),
            to,
            icon: settings.get("icon").map(str::to_string),
            text: settings.get("text").map(str::to_string),
        })
    }

    /// Whether no default field is set.
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_empty() && self.icon.is_none() && self.text.is_none()
    }
}

/// A Slack account: an incoming-webhook URL plus message defaults.
///
/// The webhook URL embeds a secret token, so `Debug` only prints its host.
#[derive(Clone, PartialEq, Eq)]
pub struct SlackAccount {
    name: String,
    url: Url,
    deprecated: &'static [&'static str],
    message_defaults: SlackMessageDefaults,
}

impl SlackAccount {
    /// The webhook URL messages are posted to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Default fields for messages sent through this account.
    pub fn message_defaults(&self) -> &SlackMessageDefaults {
        &self.message_defaults
    }
}

impl Account for SlackAccount {
    fn name(&self) -> &str {
        &self.name
    }

    fn deprecated_settings(&self) -> &[&'static str] {
        self.deprecated
    }
}

impl fmt::Debug for SlackAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackAccount")
            .field("name", &self.name)
            .field("host", &self.url.host_str().unwrap_or_default())
            .field("message_defaults", &self.message_defaults)
            .finish()
    }
}

/// Builds [`SlackAccount`]s from `account.<name>.*` settings.
///
/// Exactly one of `url` (deprecated, plain) or `secure_url` (secure store) must be
/// set, and it must be an absolute `http` or `https` URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlackAccountFactory;

impl SlackAccountFactory {
    fn webhook_url(settings: &AccountSettings) -> Result<(Url, &'static str), ValidationError> {
        let (raw, field) = match (settings.get(URL), settings.get_secure(SECURE_URL)) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::conflicting_fields(URL, SECURE_URL));
            }
            (Some(plain), None) => (plain, URL),
            (None, Some(secure)) => (secure.expose(), SECURE_URL),
            (None, None) => {
                // A plain `secure_url` is a misplaced secret, not a missing one.
                if settings.get(SECURE_URL).is_some() {
                    return Err(ValidationError::invalid_field(
                        SECURE_URL,
                        "must be stored in the secure settings store",
                    ));
                }
                return Err(ValidationError::missing_field(SECURE_URL));
            }
        };

        // Never echo the URL itself: it carries the webhook token.
        let url = Url::parse(raw.trim())
            .map_err(|e| ValidationError::invalid_field(field, format!("not a valid URL ({})", e)))?;

        match url.scheme() {
            "http" | "https" => Ok((url, field)),
            scheme => Err(ValidationError::invalid_field(
                field,
                format!("unsupported scheme '{}', expected http or https", scheme),
            )),
        }
    }
}

impl AccountFactory for SlackAccountFactory {
    type Account = SlackAccount;

    fn channel(&self) -> &str {
        "slack"
    }

    fn create(&self, name: &str, settings: &AccountSettings) -> Result<SlackAccount, ValidationError> {
        let (url, field) = Self::webhook_url(settings)?;
        let message_defaults = SlackMessageDefaults::from_settings(&settings.group(MESSAGE_DEFAULTS))?;

        Ok(SlackAccount {
            name: name.to_string(),
            url,
            deprecated: if field == URL { DEPRECATED_PLAIN_URL } else { &[] },
            message_defaults,
        })
    }
}
