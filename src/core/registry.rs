//! The account registry providing lock-free lookups and atomic reloads.

use crate::core::settings::validate_prefix;
use crate::core::{Account, AccountFactory, SettingsSnapshot};
use crate::error::{AccountError, Result};
use arc_swap::ArcSwap;
use parking_lot::ReentrantMutex;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Span, debug, info, info_span, warn};

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// One published generation of accounts together with its default account name.
///
/// The pair is only ever replaced as a whole, so holding an `Arc<RegistryState>`
/// gives a consistent view across several lookups.
#[derive(Debug)]
pub struct RegistryState<A> {
    accounts: BTreeMap<String, Arc<A>>,
    default_account: Option<String>,
    generation: u64,
}

impl<A> RegistryState<A> {
    fn empty() -> Self {
        Self {
            accounts: BTreeMap::new(),
            default_account: None,
            generation: 0,
        }
    }

    /// Resolve `name`, falling back to the default account when `name` is empty.
    ///
    /// # Errors
    ///
    /// - [`AccountError::AccountNotFound`] if a non-empty `name` is unknown
    /// - [`AccountError::NoDefaultAccountConfigured`] if `name` is empty and no default is set
    /// - [`AccountError::DefaultAccountMissing`] if the default names an absent account
    pub fn resolve(&self, name: &str) -> Result<Arc<A>> {
        if !name.is_empty() {
            return self
                .accounts
                .get(name)
                .cloned()
                .ok_or_else(|| AccountError::AccountNotFound {
                    name: name.to_string(),
                });
        }

        let default = self
            .default_account
            .as_deref()
            .ok_or(AccountError::NoDefaultAccountConfigured)?;

        self.accounts
            .get(default)
            .cloned()
            .ok_or_else(|| AccountError::DefaultAccountMissing {
                name: default.to_string(),
            })
    }

    /// Look up an account by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<A>> {
        self.accounts.get(name)
    }

    /// The full account set of this generation.
    pub fn accounts(&self) -> &BTreeMap<String, Arc<A>> {
        &self.accounts
    }

    /// Names of all accounts in this generation.
    pub fn account_names(&self) -> BTreeSet<String> {
        self.accounts.keys().cloned().collect()
    }

    /// The configured default account name, if any.
    pub fn default_account_name(&self) -> Option<&str> {
        self.default_account.as_deref()
    }

    /// Reload counter; `0` means nothing has been published yet.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// How the default account setting relates to the published account set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultAccountStatus {
    /// No default account is configured.
    Unset,
    /// The default account exists.
    Present(String),
    /// The default account is configured but was not loaded.
    Missing(String),
}

/// Outcome of a successful reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    /// Generation number that was published
    pub generation: u64,
    /// Accounts that were built and published
    pub loaded: BTreeSet<String>,
    /// Accounts the factory rejected, as `InvalidAccountConfig` errors
    pub rejected: Vec<AccountError>,
    /// Status of the default account in the new generation
    pub default_account: DefaultAccountStatus,
}

/// Single source of truth for which accounts exist and which one is the default.
///
/// Reads go through `arc-swap`, so [`resolve`](Self::resolve) never blocks and
/// never observes a half-built generation. Reloads are serialized with each other
/// and publish the new account set and default name with a single pointer swap.
///
/// # Examples
///
/// ```rust
/// use hotswap_accounts::core::{factory_fn, Account, AccountRegistry, AccountSettings, SettingsSnapshot};
/// use hotswap_accounts::error::ValidationError;
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
///     Ok::<_, ValidationError>(Named(name.to_string()))
/// });
/// let registry = AccountRegistry::new("notification.test", factory).unwrap();
///
/// let snapshot = SettingsSnapshot::new("notification.test")
///     .with_setting("notification.test.default_account", "a")
///     .with_setting("notification.test.account.a.url", "https://a.example.com");
/// registry.reload(&snapshot).unwrap();
///
/// assert_eq!(registry.resolve("").unwrap().name(), "a");
/// ```
pub struct AccountRegistry<F: AccountFactory> {
    prefix: String,
    factory: F,
    state: ArcSwap<RegistryState<F::Account>>,
    reload_lock: ReentrantMutex<()>,
    reload_requests: AtomicU64,
    span: Span,
    #[cfg(feature = "metrics")]
    metrics: Option<ReloadMetrics>,
}

impl<F: AccountFactory> AccountRegistry<F> {
    /// Create an empty registry for accounts under `prefix`.
    ///
    /// The registry logs inside a span tagged with the factory's channel and the
    /// prefix; use [`with_span`](Self::with_span) to supply a different one.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::MalformedSnapshot`] if `prefix` is not a valid dotted path.
    pub fn new(prefix: impl Into<String>, factory: F) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;

        let span = info_span!("account_registry", channel = %factory.channel(), prefix = %prefix);

        Ok(Self {
            prefix,
            factory,
            state: ArcSwap::from_pointee(RegistryState::empty()),
            reload_lock: ReentrantMutex::new(()),
            reload_requests: AtomicU64::new(0),
            span,
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    /// Log inside `span` instead of the default registry span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Record reload metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: ReloadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The settings prefix this registry reads.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The injected account factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Rebuild the whole account set from `snapshot` and publish it atomically.
    ///
    /// Accounts the factory rejects are skipped with a warning; the rest are still
    /// published. A default account that names no loaded account is warned about
    /// but does not fail the reload.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::MalformedSnapshot`] if the snapshot cannot be
    /// interpreted at all (wrong or malformed prefix). The previously published
    /// accounts stay in place in that case.
    pub fn reload(&self, snapshot: &SettingsSnapshot) -> Result<ReloadReport> {
        self.reload_serialized(|_| Ok(snapshot))
    }

    /// Take a snapshot with `take_snapshot` and publish it, as one serialized step.
    ///
    /// `take_snapshot` receives the registry prefix and runs while other reloads
    /// are held off, so an older snapshot can never be published over a newer one.
    /// If another reload is requested while the snapshot is being taken (for
    /// example by a change listener on the same thread), the snapshot is discarded
    /// and taken again.
    ///
    /// # Errors
    ///
    /// Returns the error of `take_snapshot`, or [`AccountError::MalformedSnapshot`]
    /// as for [`reload`](Self::reload). The previous accounts stay published.
    pub fn reload_with<G>(&self, take_snapshot: G) -> Result<ReloadReport>
    where
        G: Fn(&str) -> Result<SettingsSnapshot>,
    {
        self.reload_serialized(take_snapshot)
    }

    fn reload_serialized<G, S>(&self, take_snapshot: G) -> Result<ReloadReport>
    where
        G: Fn(&str) -> Result<S>,
        S: Borrow<SettingsSnapshot>,
    {
        self.reload_requests.fetch_add(1, Ordering::SeqCst);

        let _entered = self.span.enter();
        let _serialized = self.reload_lock.lock();

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(ReloadMetrics::start_reload);

        let outcome = loop {
            let seen = self.reload_requests.load(Ordering::SeqCst);
            let snapshot = match take_snapshot(&self.prefix) {
                Ok(snapshot) => snapshot,
                Err(err) => break Err(err),
            };
            if self.reload_requests.load(Ordering::SeqCst) != seen {
                debug!("reload requested while taking a snapshot, taking a fresh one");
                continue;
            }
            break self.publish(snapshot.borrow());
        };

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            match &outcome {
                Ok(report) => metrics.record_reload_success(timer, report.loaded.len(), report.rejected.len()),
                Err(_) => metrics.record_reload_failure(timer),
            }
        }

        if let Err(err) = &outcome {
            warn!(error = %err, "rejecting settings snapshot, keeping previous accounts");
        }
        outcome
    }

    /// Build and publish one generation. Callers hold `reload_lock`.
    fn publish(&self, snapshot: &SettingsSnapshot) -> Result<ReloadReport> {
        let grouped = self.check_prefix(snapshot).and_then(|()| snapshot.group())?;

        let mut accounts = BTreeMap::new();
        let mut rejected = Vec::new();

        for (name, settings) in &grouped.accounts {
            match self.factory.create(name, settings) {
                Ok(account) => {
                    for setting in account.deprecated_settings() {
                        warn!(account = %name, setting = %setting, "account uses a deprecated setting");
                    }
                    accounts.insert(name.clone(), Arc::new(account));
                }
                Err(source) => {
                    warn!(
                        account = %name,
                        field = source.field().unwrap_or("-"),
                        error = %source,
                        "skipping invalid account"
                    );
                    rejected.push(AccountError::invalid_account(name.clone(), source));
                }
            }
        }

        let default_account = match &grouped.default_account {
            None => DefaultAccountStatus::Unset,
            Some(name) if accounts.contains_key(name) => DefaultAccountStatus::Present(name.clone()),
            Some(name) => {
                warn!(
                    default_account = %name,
                    "default account is not among the loaded accounts; only explicit lookups will succeed"
                );
                DefaultAccountStatus::Missing(name.clone())
            }
        };

        let generation = self.state.load().generation + 1;
        let loaded: BTreeSet<String> = accounts.keys().cloned().collect();

        self.state.store(Arc::new(RegistryState {
            accounts,
            default_account: grouped.default_account,
            generation,
        }));

        info!(
            generation,
            accounts = loaded.len(),
            rejected = rejected.len(),
            "published account set"
        );

        Ok(ReloadReport {
            generation,
            loaded,
            rejected,
            default_account,
        })
    }

    fn check_prefix(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        if snapshot.prefix() != self.prefix {
            return Err(AccountError::MalformedSnapshot(format!(
                "snapshot taken under '{}' but registry reads '{}'",
                snapshot.prefix(),
                self.prefix
            )));
        }
        Ok(())
    }

    /// Resolve an account by name, or the default account when `name` is empty.
    ///
    /// Lock-free; never blocks on a concurrent reload.
    ///
    /// # Errors
    ///
    /// See [`RegistryState::resolve`].
    pub fn resolve(&self, name: &str) -> Result<Arc<F::Account>> {
        self.state.load().resolve(name)
    }

    /// Names of the currently published accounts.
    pub fn list_account_names(&self) -> BTreeSet<String> {
        self.state.load().account_names()
    }

    /// The currently configured default account name.
    pub fn default_account_name(&self) -> Option<String> {
        self.state.load().default_account.clone()
    }

    /// Generation of the currently published state; `0` before the first reload.
    pub fn generation(&self) -> u64 {
        self.state.load().generation
    }

    /// The whole current state, for several lookups against one generation.
    pub fn state(&self) -> Arc<RegistryState<F::Account>> {
        self.state.load_full()
    }
}
