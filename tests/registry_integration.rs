//! Integration tests: live settings store driving a Slack account service.

#![cfg(feature = "slack")]

use hotswap_accounts::notify::SubscriptionHandle;
use hotswap_accounts::prelude::*;
use hotswap_accounts::slack::{self, SlackAccountFactory};
use hotswap_accounts::sources::{ChangeListener, SettingsUpdate};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

const HOOK: &str = "https://hooks.slack.com/services/T000/B000/XXXX";

fn secure_url_key(account: &str) -> String {
    format!("notification.slack.account.{}.secure_url", account)
}

fn names(service: &slack::SlackService<DynamicSettings>) -> Vec<String> {
    service.list_account_names().into_iter().collect()
}

#[test]
fn test_service_starts_from_existing_settings() {
    let store = Arc::new(DynamicSettings::new());
    store.apply(
        SettingsUpdate::new()
            .set("notification.slack.default_account", "ops")
            .set_secure(secure_url_key("ops"), HOOK)
            .set_secure(secure_url_key("dev"), "https://hooks.slack.com/services/dev"),
    );

    let service = slack::service(store).unwrap();
    assert_eq!(service.state(), ServiceState::Ready);
    assert_eq!(names(&service), vec!["dev".to_string(), "ops".to_string()]);
    assert_eq!(service.resolve("").unwrap().name(), "ops");
    assert_eq!(service.resolve("dev").unwrap().name(), "dev");
}

#[test]
fn test_live_reload_adds_and_removes_accounts() {
    let store = Arc::new(DynamicSettings::new());
    let service = slack::service(Arc::clone(&store)).unwrap();
    assert!(names(&service).is_empty());

    store.put_secure(secure_url_key("ops"), HOOK);
    assert_eq!(names(&service), vec!["ops".to_string()]);

    store.remove_secure(secure_url_key("ops"));
    assert!(names(&service).is_empty());
    assert_eq!(
        service.resolve("ops").unwrap_err(),
        AccountError::AccountNotFound {
            name: "ops".to_string()
        }
    );
}

#[test]
fn test_default_account_lifecycle() {
    let store = Arc::new(DynamicSettings::new());
    store.put_secure(secure_url_key("ops"), HOOK);
    let service = slack::service(Arc::clone(&store)).unwrap();

    assert_eq!(service.resolve("").unwrap_err(), AccountError::NoDefaultAccountConfigured);

    store.put("notification.slack.default_account", "ops");
    assert_eq!(service.resolve("").unwrap().name(), "ops");

    // Removing the account leaves a dangling default.
    store.remove_secure(secure_url_key("ops"));
    assert_eq!(service.default_account_name().as_deref(), Some("ops"));
    assert_eq!(
        service.resolve("").unwrap_err(),
        AccountError::DefaultAccountMissing {
            name: "ops".to_string()
        }
    );
}

#[test]
fn test_invalid_account_does_not_block_others() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(DynamicSettings::new());
    store.apply(
        SettingsUpdate::new()
            .set_secure(secure_url_key("ops"), HOOK)
            .set("notification.slack.account.broken.url", "ftp://nope.example.com")
            .set("notification.slack.default_account", "broken"),
    );

    let service = slack::service(Arc::clone(&store)).unwrap();
    assert_eq!(names(&service), vec!["ops".to_string()]);
    assert!(matches!(
        service.resolve(""),
        Err(AccountError::DefaultAccountMissing { .. })
    ));

    let report = service.reload().unwrap();
    assert_eq!(report.rejected.len(), 1);
    assert!(matches!(
        &report.rejected[0],
        AccountError::InvalidAccountConfig { account, .. } if account == "broken"
    ));
}

#[test]
fn test_other_prefixes_are_ignored() {
    let store = Arc::new(DynamicSettings::new());
    let service = slack::service(Arc::clone(&store)).unwrap();
    let generation = service.registry().generation();

    store.put("notification.email.account.ops.host", "smtp.example.com");
    store.put("notification.slackware.account.ops.url", HOOK);

    assert_eq!(service.registry().generation(), generation);
    assert!(names(&service).is_empty());
}

#[test]
fn test_two_channels_share_one_store() {
    struct Email(String);

    impl Account for Email {
        fn name(&self) -> &str {
            &self.0
        }
    }

    let store = Arc::new(DynamicSettings::new());
    let email_factory = factory_fn("email", |name: &str, settings: &AccountSettings| {
        settings
            .get("host")
            .map(|_| Email(name.to_string()))
            .ok_or_else(|| ValidationError::missing_field("host"))
    });

    let slack = slack::service(Arc::clone(&store)).unwrap();
    let email = NotificationService::new(email_factory, Arc::clone(&store)).unwrap();

    store.apply(
        SettingsUpdate::new()
            .set_secure(secure_url_key("ops"), HOOK)
            .set("notification.email.account.ops.host", "smtp.example.com")
            .set("notification.email.default_account", "ops"),
    );

    assert_eq!(slack.resolve("ops").unwrap().name(), "ops");
    assert_eq!(email.resolve("").unwrap().name(), "ops");
    assert_eq!(slack.resolve("").unwrap_err(), AccountError::NoDefaultAccountConfigured);
}

#[test]
fn test_one_reload_per_batch() {
    let store = Arc::new(DynamicSettings::new());
    let service = slack::service(Arc::clone(&store)).unwrap();
    let before = service.registry().generation();

    store.apply(
        SettingsUpdate::new()
            .set_secure(secure_url_key("a"), HOOK)
            .set_secure(secure_url_key("b"), HOOK)
            .set("notification.slack.default_account", "a"),
    );

    assert_eq!(service.registry().generation(), before + 1);
    assert_eq!(service.list_account_names().len(), 2);
}

#[test]
fn test_dropping_service_unsubscribes() {
    let store = Arc::new(DynamicSettings::new());
    let service = slack::service(Arc::clone(&store)).unwrap();
    assert_eq!(store.listener_count(), 1);

    drop(service);
    assert_eq!(store.listener_count(), 0);

    // Writes after the drop must not reach the dead registry.
    store.put_secure(secure_url_key("ops"), HOOK);
}

/// Wraps [`DynamicSettings`] and can be switched into a state where every
/// snapshot fails.
struct FlakyStore {
    inner: DynamicSettings,
    broken: AtomicBool,
    snapshots: AtomicUsize,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: DynamicSettings::new(),
            broken: AtomicBool::new(false),
            snapshots: AtomicUsize::new(0),
        }
    }
}

impl SettingsStore for FlakyStore {
    fn snapshot(&self, prefix: &str) -> Result<SettingsSnapshot> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            return Err(AccountError::MalformedSnapshot(
                "backend returned garbage".to_string(),
            ));
        }
        self.inner.snapshot(prefix)
    }

    fn subscribe(&self, prefix: &str, listener: ChangeListener) -> SubscriptionHandle {
        self.inner.subscribe(prefix, listener)
    }
}

#[test]
fn test_unreadable_snapshot_keeps_previous_accounts() {
    let store = Arc::new(FlakyStore::new());
    store.inner.put_secure(secure_url_key("ops"), HOOK);
    store.inner.put("notification.slack.default_account", "ops");

    let service = NotificationService::new(SlackAccountFactory, Arc::clone(&store)).unwrap();
    let generation = service.registry().generation();

    store.broken.store(true, Ordering::SeqCst);
    store.inner.remove_secure(secure_url_key("ops"));

    assert_eq!(service.registry().generation(), generation);
    assert_eq!(service.resolve("").unwrap().name(), "ops");
    assert!(matches!(service.reload(), Err(AccountError::MalformedSnapshot(_))));

    store.broken.store(false, Ordering::SeqCst);
    service.reload().unwrap();
    assert!(service.list_account_names().is_empty());
}

#[test]
fn test_initial_snapshot_failure_fails_construction() {
    let store = Arc::new(FlakyStore::new());
    store.broken.store(true, Ordering::SeqCst);

    let result = NotificationService::new(SlackAccountFactory, Arc::clone(&store));
    assert!(result.is_err());
    assert_eq!(store.snapshots.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.listener_count(), 0);
}

/// Wraps [`DynamicSettings`] and can land one write right after taking the next
/// snapshot, before handing that (now outdated) snapshot back.
struct InterleavingStore {
    inner: DynamicSettings,
    late_account: Mutex<Option<String>>,
}

impl InterleavingStore {
    fn new() -> Self {
        Self {
            inner: DynamicSettings::new(),
            late_account: Mutex::new(None),
        }
    }

    fn add_account_during_next_snapshot(&self, name: &str) {
        *self.late_account.lock().unwrap() = Some(name.to_string());
    }
}

impl SettingsStore for InterleavingStore {
    fn snapshot(&self, prefix: &str) -> Result<SettingsSnapshot> {
        let snapshot = self.inner.snapshot(prefix)?;
        let late = self.late_account.lock().unwrap().take();
        if let Some(name) = late {
            self.inner.put_secure(secure_url_key(&name), HOOK);
        }
        Ok(snapshot)
    }

    fn subscribe(&self, prefix: &str, listener: ChangeListener) -> SubscriptionHandle {
        self.inner.subscribe(prefix, listener)
    }
}

#[test]
fn test_write_during_initial_snapshot_is_not_lost() {
    let store = Arc::new(InterleavingStore::new());
    store.inner.put_secure(secure_url_key("ops"), HOOK);
    store.add_account_during_next_snapshot("late");

    let service = NotificationService::new(SlackAccountFactory, Arc::clone(&store)).unwrap();

    assert!(store.inner.has_secure(&secure_url_key("late")));
    let names: Vec<String> = service.list_account_names().into_iter().collect();
    assert_eq!(names, vec!["late".to_string(), "ops".to_string()]);
}

#[test]
fn test_manual_reload_does_not_publish_outdated_snapshot() {
    let store = Arc::new(InterleavingStore::new());
    store.inner.put_secure(secure_url_key("ops"), HOOK);
    let service = NotificationService::new(SlackAccountFactory, Arc::clone(&store)).unwrap();

    store.add_account_during_next_snapshot("late");
    let report = service.reload().unwrap();

    assert!(report.loaded.contains("late"));
    assert!(service.resolve("late").is_ok());
    assert_eq!(service.list_account_names().len(), 2);
}

#[test]
fn test_readers_never_observe_partial_account_sets() {
    const ACCOUNTS: usize = 5;
    const ROUNDS: usize = 50;

    let store = Arc::new(DynamicSettings::new());
    let service = slack::service(Arc::clone(&store)).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut last_generation = 0;
                while !done.load(Ordering::Acquire) {
                    let state = service.registry().state();
                    assert!(state.generation() >= last_generation);
                    last_generation = state.generation();

                    // Every published set is a0..aN with aN as the default.
                    let expected: BTreeSet<String> =
                        (0..state.len()).map(|i| format!("a{}", i)).collect();
                    assert_eq!(state.account_names(), expected);
                    match state.default_account_name() {
                        Some(default) => {
                            assert_eq!(default, format!("a{}", state.len() - 1));
                            assert_eq!(state.resolve("").unwrap().name(), default);
                        }
                        None => assert!(state.is_empty()),
                    }
                }
            });
        }

        scope.spawn(|| {
            for _ in 0..ROUNDS {
                for i in 0..ACCOUNTS {
                    let name = format!("a{}", i);
                    store.apply(
                        SettingsUpdate::new()
                            .set_secure(secure_url_key(&name), HOOK)
                            .set("notification.slack.default_account", name.clone()),
                    );
                }

                let mut reset = SettingsUpdate::new().remove("notification.slack.default_account");
                for i in 0..ACCOUNTS {
                    reset = reset.remove_secure(secure_url_key(&format!("a{}", i)));
                }
                store.apply(reset);
            }
            done.store(true, Ordering::Release);
        });
    });

    assert!(service.list_account_names().is_empty());
    assert_eq!(
        service.registry().generation(),
        1 + (ROUNDS * (ACCOUNTS + 1)) as u64
    );
}

proptest! {
    #[test]
    fn prop_listing_matches_valid_accounts(
        valid in prop::collection::btree_set("[a-z]{1,8}", 0..6),
        invalid in prop::collection::btree_set("[A-Z]{1,8}", 0..4),
    ) {
        let store = Arc::new(DynamicSettings::new());
        let mut update = SettingsUpdate::new();
        for name in &valid {
            update = update.set_secure(secure_url_key(name), HOOK);
        }
        for name in &invalid {
            update = update.set(format!("notification.slack.account.{}.message_defaults.from", name), "bot");
        }
        store.apply(update);

        let service = slack::service(Arc::clone(&store)).unwrap();
        prop_assert_eq!(service.list_account_names(), valid.clone());

        // Reloading unchanged settings yields the same account set.
        let report = service.reload().unwrap();
        prop_assert_eq!(report.loaded, valid);
        prop_assert_eq!(report.rejected.len(), invalid.len());
    }
}
