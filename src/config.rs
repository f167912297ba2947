use std::time::Duration;

/// Seconds in one hour, used by the multisignature lifetime rule.
pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Base lifetime of an unconfirmed transaction, in seconds.
pub const UNCONFIRMED_TRANSACTION_TIMEOUT: i64 = 10_800;

/// Lifetime multiplier for transactions that carry a signature list.
pub const SIGNATURE_TRANSACTION_TIMEOUT_MULTIPLIER: i64 = 4;

/// Chain epoch (2016-05-24T17:00:00Z). Transaction timestamps are seconds
/// since this instant.
pub const EPOCH_TIME_UNIX: i64 = 1_464_109_200;

#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of transactions inside the pool, summed over the
    /// unverified, pending and ready lists.
    pub max_tx: usize,
    /// Interval between promotion ticks.
    pub process_interval: Duration,
    /// Interval between expiry sweeps. The invalid-cache reset runs at the
    /// same cadence.
    pub expiry_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tx: 4000,
            process_interval: Duration::from_secs(30),
            expiry_interval: Duration::from_secs(30),
        }
    }
}
