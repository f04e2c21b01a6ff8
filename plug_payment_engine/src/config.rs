use std::time::Duration as StdDuration;

use chrono::Duration;
use log::*;

const DEFAULT_ESCROW_HOLD_DAYS: i64 = 3;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_OTP_TTL_MINS: i64 = 5;
const DEFAULT_LOCK_TTL_SECS: i64 = 120;

/// Escrow timing knobs, read from the environment with logged defaults.
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    /// How long funds stay Locked after delivery before the sweeper may open them.
    pub hold: Duration,
    /// How often the unlock sweeper runs.
    pub sweep_interval: StdDuration,
    /// Lifetime of a payout OTP.
    pub otp_ttl: Duration,
    /// TTL on advisory locks (sweeper mutual exclusion, per-party withdrawal serialization). A
    /// crashed holder blocks new attempts for at most this long.
    pub lock_ttl: Duration,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            hold: Duration::days(DEFAULT_ESCROW_HOLD_DAYS),
            sweep_interval: StdDuration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            otp_ttl: Duration::minutes(DEFAULT_OTP_TTL_MINS),
            lock_ttl: Duration::seconds(DEFAULT_LOCK_TTL_SECS),
        }
    }
}

impl EscrowConfig {
    pub fn new_from_env_or_default() -> Self {
        let hold = match std::env::var("PPE_ESCROW_HOLD_DAYS").ok().and_then(|s| s.parse::<i64>().ok()) {
            Some(days) => Duration::days(days),
            None => {
                info!("PPE_ESCROW_HOLD_DAYS not set, using {DEFAULT_ESCROW_HOLD_DAYS} days");
                Duration::days(DEFAULT_ESCROW_HOLD_DAYS)
            },
        };
        let sweep_interval = match std::env::var("PPE_SWEEP_INTERVAL_SECS").ok().and_then(|s| s.parse::<u64>().ok()) {
            Some(secs) => StdDuration::from_secs(secs),
            None => {
                info!("PPE_SWEEP_INTERVAL_SECS not set, using {DEFAULT_SWEEP_INTERVAL_SECS}s");
                StdDuration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)
            },
        };
        Self { hold, sweep_interval, ..Self::default() }
    }
}
