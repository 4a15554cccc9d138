//! Builder for constructing NotificationService instances.

use crate::core::{AccountFactory, AccountRegistry, NotificationService};
use crate::error::Result;
use crate::sources::SettingsStore;
use std::sync::Arc;
use tracing::Span;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// Builder for constructing a [`NotificationService`].
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::prelude::*;
/// use hotswap_accounts::slack::SlackAccountFactory;
/// use std::sync::Arc;
///
/// # fn example() -> Result<()> {
/// let store = Arc::new(DynamicSettings::new());
/// let service = NotificationService::builder(SlackAccountFactory, store)
///     .with_prefix("xpack.notification.slack")
///     .with_span(tracing::info_span!("slack_accounts"))
///     .build()?;
///
/// assert_eq!(service.registry().prefix(), "xpack.notification.slack");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct NotificationServiceBuilder<F: AccountFactory, S: SettingsStore> {
    factory: F,
    store: Arc<S>,
    prefix: Option<String>,
    span: Option<Span>,
    #[cfg(feature = "metrics")]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl<F: AccountFactory, S: SettingsStore> NotificationServiceBuilder<F, S> {
    /// Create a new builder for `factory` backed by `store`.
    pub fn new(factory: F, store: Arc<S>) -> Self {
        Self {
            factory,
            store,
            prefix: None,
            span: None,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    /// Read accounts under `prefix` instead of the factory's default prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Emit the registry's log events inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Record reload metrics with `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Build the service.
    ///
    /// This performs the initial reload and subscribes to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The prefix is not a valid dotted path
    /// - The store cannot produce the initial snapshot
    pub fn build(self) -> Result<NotificationService<F, S>> {
        let prefix = self
            .prefix
            .unwrap_or_else(|| self.factory.default_prefix());

        #[cfg(feature = "metrics")]
        let channel = self.factory.channel().to_string();

        let mut registry = AccountRegistry::new(prefix, self.factory)?;

        if let Some(span) = self.span {
            registry = registry.with_span(span);
        }

        #[cfg(feature = "metrics")]
        if let Some(meter) = self.meter {
            registry = registry.with_metrics(ReloadMetrics::new(meter, channel));
        }

        NotificationService::start(registry, self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Account, AccountSettings, ServiceState, factory_fn};
    use crate::error::{AccountError, ValidationError};
    use crate::sources::DynamicSettings;

    struct Named(String);

    impl Account for Named {
        fn name(&self) -> &str {
            &self.0
        }
    }

    fn factory() -> impl AccountFactory<Account = Named> {
        factory_fn("test", |name: &str, _settings: &AccountSettings| {
            Ok::<_, ValidationError>(Named(name.to_string()))
        })
    }

    #[test]
    fn test_builder_uses_factory_prefix() {
        let store = Arc::new(DynamicSettings::new());
        store.put("notification.test.account.a.url", "x");

        let service = NotificationServiceBuilder::new(factory(), store).build().unwrap();
        assert_eq!(service.registry().prefix(), "notification.test");
        assert_eq!(service.state(), ServiceState::Ready);
        assert!(service.resolve("a").is_ok());
    }

    #[test]
    fn test_builder_custom_prefix() {
        let store = Arc::new(DynamicSettings::new());
        store.put("custom.test.account.b.url", "x");

        let service = NotificationServiceBuilder::new(factory(), store)
            .with_prefix("custom.test")
            .build()
            .unwrap();
        assert_eq!(service.list_account_names().len(), 1);
    }

    #[test]
    fn test_builder_rejects_malformed_prefix() {
        let store = Arc::new(DynamicSettings::new());
        let result = NotificationServiceBuilder::new(factory(), store)
            .with_prefix("custom..test")
            .build();
        assert!(matches!(result, Err(AccountError::MalformedSnapshot(_))));
    }
}
