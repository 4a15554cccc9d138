//! Account reload metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for account registry reloads.
///
/// Tracks reload attempts, success/failure rates, latencies, and how many
/// accounts were published or rejected, tagged with the channel name.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_accounts::metrics::ReloadMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("hotswap-accounts");
/// let metrics = ReloadMetrics::new(meter, "slack");
///
/// let timer = metrics.start_reload();
/// // ... perform reload ...
/// metrics.record_reload_success(timer, 3, 0);
/// ```
#[derive(Clone)]
pub struct ReloadMetrics {
    reload_attempts: Counter<u64>,
    reload_success: Counter<u64>,
    reload_failures: Counter<u64>,
    reload_duration: Histogram<f64>,
    accounts_loaded: Gauge<u64>,
    accounts_rejected: Counter<u64>,
    attributes: Vec<KeyValue>,
}

impl ReloadMetrics {
    /// Create a new metrics collector for `channel` with the provided meter.
    pub fn new(meter: Meter, channel: impl Into<String>) -> Self {
        let reload_attempts = meter
            .u64_counter("hotswap_accounts.reload.attempts")
            .with_description("Total number of account reload attempts")
            .build();

        let reload_success = meter
            .u64_counter("hotswap_accounts.reload.success")
            .with_description("Number of reloads that published an account set")
            .build();

        let reload_failures = meter
            .u64_counter("hotswap_accounts.reload.failures")
            .with_description("Number of reloads rejected as malformed")
            .build();

        let reload_duration = meter
            .f64_histogram("hotswap_accounts.reload.duration")
            .with_description("Duration of reload operations in seconds")
            .with_unit("s")
            .build();

        let accounts_loaded = meter
            .u64_gauge("hotswap_accounts.accounts.loaded")
            .with_description("Number of accounts in the published account set")
            .build();

        let accounts_rejected = meter
            .u64_counter("hotswap_accounts.accounts.rejected")
            .with_description("Number of accounts skipped because their settings were invalid")
            .build();

        Self {
            reload_attempts,
            reload_success,
            reload_failures,
            reload_duration,
            accounts_loaded,
            accounts_rejected,
            attributes: vec![KeyValue::new("channel", channel.into())],
        }
    }

    /// Start a reload operation timer.
    ///
    /// Pass the returned `Instant` to `record_reload_success` or
    /// `record_reload_failure` when the reload completes.
    pub fn start_reload(&self) -> Instant {
        self.reload_attempts.add(1, &self.attributes);
        Instant::now()
    }

    /// Record a reload that published `loaded` accounts and skipped `rejected` ones.
    pub fn record_reload_success(&self, start: Instant, loaded: usize, rejected: usize) {
        self.reload_success.add(1, &self.attributes);
        self.reload_duration
            .record(start.elapsed().as_secs_f64(), &self.attributes);
        self.accounts_loaded.record(loaded as u64, &self.attributes);
        if rejected > 0 {
            self.accounts_rejected.add(rejected as u64, &self.attributes);
        }
    }

    /// Record a reload that was rejected before publishing.
    pub fn record_reload_failure(&self, start: Instant) {
        self.reload_failures.add(1, &self.attributes);
        self.reload_duration
            .record(start.elapsed().as_secs_f64(), &self.attributes);
    }
}
