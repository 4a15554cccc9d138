//! Settings sources, loaders, and live stores.

mod env;
mod file;
mod loader;
mod settings_source;
mod store;

pub use env::EnvSource;
pub use file::FileSource;
pub use loader::SettingsLoader;
pub use settings_source::SettingsSource;
pub use store::{ChangeListener, DynamicSettings, SettingsStore, SettingsUpdate};
