//! Configuration types: sending rules, scheduler tuning, delivery policy,
//! and per-sender setup.

use std::time::Duration as StdDuration;

use chrono::{Duration, Weekday};

use crate::error::ConfigError;

/// Business-hours rules applied to every recipient.
///
/// There is exactly one rule set per scheduler run; the calendar, the
/// horizon slot generator, and commit-time re-validation all read the same
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct SendingRules {
    /// First allowed local hour (inclusive).
    pub allowed_hour_start: u32,
    /// First disallowed local hour (exclusive upper bound).
    pub allowed_hour_end: u32,
    /// Weekdays on which nothing is sent, in the recipient's timezone.
    pub excluded_weekdays: Vec<Weekday>,
    /// Minimum separation between two sends from the same identity.
    pub min_gap: Duration,
}

impl Default for SendingRules {
    fn default() -> Self {
        Self {
            allowed_hour_start: 7,
            allowed_hour_end: 18,
            excluded_weekdays: vec![Weekday::Sat, Weekday::Sun],
            min_gap: Duration::minutes(20),
        }
    }
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub rules: SendingRules,
    /// Granularity of candidate slots within a window.
    pub slot_interval: Duration,
    /// Initial horizon span in days.
    pub horizon_days: i64,
    /// Daily limit assumed when computing horizon capacity.
    pub default_daily_limit: u32,
    /// Distinct schedule days the allocator will try before giving up.
    pub max_days_tried: usize,
    /// Pause between send-loop sweeps.
    pub sweep_interval: StdDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rules: SendingRules::default(),
            slot_interval: Duration::minutes(20),
            horizon_days: 10,
            default_daily_limit: 30,
            max_days_tried: 10,
            sweep_interval: StdDuration::from_secs(1200),
        }
    }
}

/// Delivery policy for the send loop.
///
/// `retry_limit` is the number of extra transport attempts after the first
/// one. The default of 0 is at-most-once, fail-fast delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendPolicy {
    pub retry_limit: u32,
}

/// One sending identity's configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Unique sender identity (the from-address).
    pub identity: String,
    pub daily_limit: u32,
    /// Region tag used for recipient affinity (e.g. "germany").
    pub region: String,
    /// Opaque reference to transport credentials; the core never reads it.
    pub credentials_ref: Option<String>,
}

impl SenderConfig {
    /// Load sender configurations from the environment.
    ///
    /// Reads `SENDER_COUNT` and, for each index `i` in `1..=count`:
    /// `SENDER_IDENTITY_{i}` (required), `SENDER_DAILY_LIMIT_{i}` (default
    /// 30), `SENDER_REGION_{i}` (default "global"), and
    /// `SENDER_CREDENTIALS_REF_{i}` (optional).
    pub fn from_env() -> Result<Vec<Self>, ConfigError> {
        let count: usize = std::env::var("SENDER_COUNT")
            .map_err(|_| ConfigError::MissingEnvVar("SENDER_COUNT".into()))?
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SENDER_COUNT".into(),
                message: format!("{e}"),
            })?;

        let mut senders = Vec::with_capacity(count);
        for i in 1..=count {
            let identity_key = format!("SENDER_IDENTITY_{i}");
            let identity = std::env::var(&identity_key)
                .map_err(|_| ConfigError::MissingEnvVar(identity_key))?;

            let daily_limit: u32 = std::env::var(format!("SENDER_DAILY_LIMIT_{i}"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30);

            let region = std::env::var(format!("SENDER_REGION_{i}"))
                .unwrap_or_else(|_| "global".to_string());

            let credentials_ref = std::env::var(format!("SENDER_CREDENTIALS_REF_{i}")).ok();

            senders.push(Self {
                identity,
                daily_limit,
                region,
                credentials_ref,
            });
        }

        Ok(senders)
    }
}
