//! Outreach — outbound email scheduling and rate-limited distribution.
//!
//! Decides when, and through which identity, each message of a batch goes
//! out: recipients are only contacted in their local business hours, no
//! identity exceeds its daily quota or minimum send spacing, load is
//! balanced with regional affinity, and the whole plan survives restarts
//! through whole-aggregate persistence.

pub mod allocator;
pub mod calendar;
pub mod campaign;
pub mod config;
pub mod distributor;
pub mod error;
pub mod horizon;
pub mod model;
pub mod sendloop;
pub mod store;
pub mod tracker;
pub mod transport;
pub mod validation;

pub use error::{Error, Result};
