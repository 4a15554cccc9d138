//! Built-in metrics for account reloads.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Reload attempts/success/failures
//! - Reload duration
//! - Accounts loaded and rejected
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotswap_accounts::prelude::*;
//! use hotswap_accounts::slack::SlackAccountFactory;
//! use opentelemetry::global;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<()> {
//! let store = Arc::new(DynamicSettings::new());
//! let service = NotificationService::builder(SlackAccountFactory, store)
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod reload_metrics;

pub use reload_metrics::ReloadMetrics;
