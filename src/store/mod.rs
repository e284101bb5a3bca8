//! Tracker persistence port.
//!
//! The tracker is persisted as a whole-aggregate snapshot after every
//! mutation; that snapshot is the recovery log across restarts. Any durable
//! key-value or document store can sit behind this two-method port as long
//! as it preserves snapshot semantics.

mod json_file;
mod records;

pub use json_file::JsonFileStore;
pub use records::JsonlRecordStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::Tracker;

/// Narrow persistence port for the tracker aggregate.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Load the persisted tracker.
    ///
    /// A missing or unreadable persisted form is non-fatal and degrades to
    /// the empty default tracker.
    async fn load(&self) -> Tracker;

    /// Persist the full aggregate. Called after every mutation that changes
    /// counts, queues, or campaign counters.
    async fn save(&self, tracker: &Tracker) -> Result<(), StoreError>;
}
