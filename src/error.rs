//! Error types for the scheduling engine.

use crate::model::ScheduleDay;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Distribution error: {0}")]
    Distribute(#[from] DistributeError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Capacity tracker errors.
///
/// `NotInitialized` is a programmer error in the caller (senders must be
/// initialized before any capacity operation); `NoCapacity` is an expected,
/// recoverable outcome.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Sender {0} not initialized in tracker")]
    NotInitialized(String),

    #[error("No remaining capacity for {identity} on {day}")]
    NoCapacity { identity: String, day: ScheduleDay },

    #[error("Campaign {0} not found in tracker")]
    UnknownCampaign(String),
}

/// Batch distribution errors.
#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error("No senders available")]
    NoSenders,
}

/// Input validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Daily limit must be positive, got {0}")]
    InvalidDailyLimit(u32),

    #[error("Invalid sending rules: {0}")]
    InvalidRules(String),
}

/// Tracker persistence errors.
///
/// `Corrupt` never escapes the store: `load()` degrades to the empty default
/// tracker. It only surfaces through logs.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persisted tracker unreadable: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Mail transport errors. Failure is opaque — there are no partial-send
/// semantics to report.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Send failed for {identity}: {reason}")]
    SendFailed { identity: String, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
