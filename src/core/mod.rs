//! Core account registry types.

mod account;
mod builder;
mod registry;
mod service;
pub(crate) mod settings;

pub use account::{Account, AccountFactory, FnFactory, factory_fn};
pub use builder::NotificationServiceBuilder;
pub use registry::{AccountRegistry, DefaultAccountStatus, RegistryState, ReloadReport};
pub use service::{NotificationService, ServiceState};
pub use settings::{
    ACCOUNT_GROUP_KEY, AccountSettings, DEFAULT_ACCOUNT_KEY, GroupedSettings, SecureString,
    SettingsSnapshot,
};
