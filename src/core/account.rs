//! Account and account factory contracts.

use crate::core::AccountSettings;
use crate::error::ValidationError;
use std::fmt;
use std::marker::PhantomData;

/// An immutable, named bundle of settings for delivering through one channel.
///
/// Accounts never change after construction. A settings change produces a new
/// account value on the next reload.
pub trait Account: Send + Sync + 'static {
    /// The unique account name.
    fn name(&self) -> &str;

    /// Settings this account was configured through that are deprecated.
    ///
    /// The registry logs a warning for each entry after every reload.
    fn deprecated_settings(&self) -> &[&'static str] {
        &[]
    }
}

/// Validates one account's settings subtree and builds the account.
///
/// Implementations must be pure and deterministic: the same subtree always yields
/// an equivalent account or the same [`ValidationError`]. They must not perform
/// I/O or block, since they run inside a reload.
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::core::{Account, AccountFactory, AccountSettings};
/// use hotswap_accounts::error::ValidationError;
///
/// struct Webhook {
///     name: String,
///     url: String,
/// }
///
/// impl Account for Webhook {
///     fn name(&self) -> &str {
///         &self.name
///     }
/// }
///
/// struct WebhookFactory;
///
/// impl AccountFactory for WebhookFactory {
///     type Account = Webhook;
///
///     fn channel(&self) -> &str {
///         "webhook"
///     }
///
///     fn create(&self, name: &str, settings: &AccountSettings) -> Result<Webhook, ValidationError> {
///         let url = settings
///             .get("url")
///             .ok_or_else(|| ValidationError::missing_field("url"))?;
///         Ok(Webhook { name: name.to_string(), url: url.to_string() })
///     }
/// }
/// ```
pub trait AccountFactory: Send + Sync + 'static {
    /// The account type this factory produces.
    type Account: Account;

    /// Channel identifier, used in log spans and the default settings prefix.
    fn channel(&self) -> &str;

    /// Settings prefix used when the caller does not pick one.
    fn default_prefix(&self) -> String {
        format!("notification.{}", self.channel())
    }

    /// Build the account `name` from its settings subtree.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending field when a required
    /// field is missing, a value is malformed, or mutually exclusive fields are
    /// both set.
    fn create(
        &self,
        name: &str,
        settings: &AccountSettings,
    ) -> Result<Self::Account, ValidationError>;
}

/// An [`AccountFactory`] backed by a closure.
///
/// Handy for channels whose validation fits in a function, and for tests.
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::core::{factory_fn, Account, AccountFactory, AccountSettings};
///
/// struct Named(String);
///
/// impl Account for Named {
///     fn name(&self) -> &str {
///         &self.0
///     }
/// }
///
/// let factory = factory_fn("test", |name: &str, _settings: &AccountSettings| {
///     Ok(Named(name.to_string()))
/// });
/// assert_eq!(factory.channel(), "test");
/// ```
pub struct FnFactory<A, F> {
    channel: String,
    create: F,
    _account: PhantomData<fn() -> A>,
}

/// Build an [`FnFactory`] for `channel` from a closure.
pub fn factory_fn<A, F>(channel: impl Into<String>, create: F) -> FnFactory<A, F>
where
    A: Account,
    F: Fn(&str, &AccountSettings) -> Result<A, ValidationError> + Send + Sync + 'static,
{
    FnFactory {
        channel: channel.into(),
        create,
        _account: PhantomData,
    }
}

impl<A, F> AccountFactory for FnFactory<A, F>
where
    A: Account,
    F: Fn(&str, &AccountSettings) -> Result<A, ValidationError> + Send + Sync + 'static,
{
    type Account = A;

    fn channel(&self) -> &str {
        &self.channel
    }

    fn create(&self, name: &str, settings: &AccountSettings) -> Result<A, ValidationError> {
        (self.create)(name, settings)
    }
}

impl<A, F> fmt::Debug for FnFactory<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
