//! The notification service facade wiring a settings store to an account registry.

use crate::core::{AccountFactory, AccountRegistry, NotificationServiceBuilder, ReloadReport};
use crate::error::Result;
use crate::notify::{ChangeEvent, SubscriptionHandle};
use crate::sources::SettingsStore;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

/// Lifecycle state of a [`NotificationService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No account set has been published yet.
    Uninitialized,
    /// At least one reload succeeded; accounts can be resolved.
    Ready,
}

/// Notification accounts for one channel, kept in sync with a settings store.
///
/// Construction subscribes to the store and then performs one reload from its
/// current settings, so every change under the registry's prefix triggers
/// exactly one reload from a fresh snapshot. Account lookups are delegated to the
/// [`AccountRegistry`] and never block.
///
/// Dropping the service unsubscribes it from the store.
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
/// store.put("notification.slack.account.ops.url", "https://hooks.example.com/ops");
///
/// let service = NotificationService::new(SlackAccountFactory, Arc::clone(&store))?;
/// assert!(service.resolve("ops").is_ok());
///
/// // Settings changes are picked up without a restart.
/// store.put("notification.slack.default_account", "ops");
/// assert_eq!(service.resolve("")?.name(), "ops");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct NotificationService<F: AccountFactory, S: SettingsStore> {
    registry: Arc<AccountRegistry<F>>,
    store: Arc<S>,
    _subscription: SubscriptionHandle,
}

impl<F: AccountFactory, S: SettingsStore> NotificationService<F, S> {
    /// Create a service reading `factory`'s default prefix from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot produce the initial snapshot or the
    /// snapshot is malformed.
    pub fn new(factory: F, store: Arc<S>) -> Result<Self> {
        Self::builder(factory, store).build()
    }

    /// Create a builder for finer control over prefix, logging span, and metrics.
    pub fn builder(factory: F, store: Arc<S>) -> NotificationServiceBuilder<F, S> {
        NotificationServiceBuilder::new(factory, store)
    }

    /// Subscribe to changes, then perform the initial reload.
    ///
    /// Subscribing first means a write that lands while the initial snapshot is
    /// being taken still triggers a reload.
    pub(crate) fn start(registry: AccountRegistry<F>, store: Arc<S>) -> Result<Self> {
        let registry = Arc::new(registry);

        let listener_registry = Arc::clone(&registry);
        let listener_store: Weak<S> = Arc::downgrade(&store);
        let subscription = store.subscribe(
            registry.prefix(),
            Box::new(move |event: &ChangeEvent| {
                let Some(store) = listener_store.upgrade() else {
                    return;
                };
                tracing::debug!(changes = event.changes.len(), "settings changed, reloading accounts");
                if let Err(err) = reload_from(&listener_registry, &*store) {
                    tracing::warn!(error = %err, "reload after settings change failed, previous accounts remain");
                }
            }),
        );

        reload_from(&registry, &*store)?;

        Ok(Self {
            registry,
            store,
            _subscription: subscription,
        })
    }

    /// Resolve an account by name, or the default account when `name` is empty.
    ///
    /// # Errors
    ///
    /// - [`AccountError::AccountNotFound`](crate::error::AccountError::AccountNotFound)
    /// - [`AccountError::NoDefaultAccountConfigured`](crate::error::AccountError::NoDefaultAccountConfigured)
    /// - [`AccountError::DefaultAccountMissing`](crate::error::AccountError::DefaultAccountMissing)
    pub fn resolve(&self, name: &str) -> Result<Arc<F::Account>> {
        self.registry.resolve(name)
    }

    /// Names of the currently published accounts.
    pub fn list_account_names(&self) -> BTreeSet<String> {
        self.registry.list_account_names()
    }

    /// The currently configured default account name.
    pub fn default_account_name(&self) -> Option<String> {
        self.registry.default_account_name()
    }

    /// Reload from a fresh snapshot now, outside of any change notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or is malformed; the
    /// previous accounts stay published.
    pub fn reload(&self) -> Result<ReloadReport> {
        reload_from(&self.registry, &*self.store)
    }

    /// Lifecycle state.
    pub fn state(&self) -> ServiceState {
        if self.registry.generation() == 0 {
            ServiceState::Uninitialized
        } else {
            ServiceState::Ready
        }
    }

    /// The underlying account registry.
    pub fn registry(&self) -> &AccountRegistry<F> {
        &self.registry
    }

    /// The settings store this service follows.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

fn reload_from<F: AccountFactory, S: SettingsStore + ?Sized>(
    registry: &AccountRegistry<F>,
    store: &S,
) -> Result<ReloadReport> {
    registry.reload_with(|prefix| store.snapshot(prefix))
}
