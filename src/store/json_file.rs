//! File-backed tracker store — one pretty-printed JSON snapshot per save.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::model::Tracker;
use crate::store::TrackerStore;

/// Stores the tracker as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn try_load(&self) -> Result<Tracker, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

#[async_trait]
impl TrackerStore for JsonFileStore {
    async fn load(&self) -> Tracker {
        match self.try_load().await {
            Ok(tracker) => tracker,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No tracker file, starting fresh");
                Tracker::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Tracker unreadable, starting fresh");
                Tracker::default()
            }
        }
    }

    async fn save(&self, tracker: &Tracker) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(tracker)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::model::ScheduleDay;

    fn populated_tracker() -> Tracker {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let mut tracker = Tracker::default();
        tracker.initialize_sender("a@x.com", 30, "germany", now);
        tracker.create_campaign("c1", 5, now);
        tracker.record_assignment("a@x.com", now, now).unwrap();
        tracker.campaign_mut("c1").unwrap().emails_scheduled = 1;
        tracker
    }

    #[tokio::test]
    async fn round_trips_a_populated_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tracker.json"));

        let tracker = populated_tracker();
        store.save(&tracker).await.unwrap();
        let loaded = store.load().await;
        assert_eq!(loaded, tracker);
    }

    #[tokio::test]
    async fn missing_file_yields_empty_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));

        let loaded = store.load().await;
        assert!(loaded.sending_accounts.is_empty());
        assert!(loaded.campaigns.is_empty());
        assert_eq!(loaded.meta.version, "1.0");
    }

    #[tokio::test]
    async fn corrupt_file_yields_empty_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        tokio::fs::write(&path, b"{not json at all").await.unwrap();

        let store = JsonFileStore::new(path);
        let loaded = store.load().await;
        assert!(loaded.sending_accounts.is_empty());
        assert_eq!(loaded.meta.version, "1.0");
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/dir/tracker.json"));
        store.save(&Tracker::default()).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn persisted_shape_uses_documented_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tracker.json"));
        store.save(&populated_tracker()).await.unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let account = &value["sending_accounts"]["a@x.com"];
        assert!(account["daily_limit"].is_number());
        assert!(account["daily_schedule_count"].is_object());
        assert!(account["email_queue"].is_array());
        assert!(value["campaigns"]["c1"]["total_emails"].is_number());
        assert_eq!(value["meta"]["version"], "1.0");
    }

    #[tokio::test]
    async fn day_count_present_for_schedule_day() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("tracker.json"));
        store.save(&populated_tracker()).await.unwrap();

        let loaded = store.load().await;
        let day = ScheduleDay::containing(now);
        assert_eq!(
            loaded.sending_accounts["a@x.com"].daily_schedule_count[&day],
            1
        );
    }
}
