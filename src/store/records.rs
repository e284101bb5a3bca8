//! JSON-lines record store — an append-only outbound log on disk.
//!
//! Stands in for the real row store behind the same trait; one JSON object
//! per line keeps appends cheap and the file greppable.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;
use crate::transport::{OutboundRecord, OutboundRecordStore};

#[derive(Debug, Clone)]
pub struct JsonlRecordStore {
    path: PathBuf,
}

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp: chrono::DateTime<Utc>,
    direction: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a OutboundRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replied_message_id: Option<&'a str>,
}

impl JsonlRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn append(&self, line: &LogLine<'_>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut json = serde_json::to_string(line)?;
        json.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl OutboundRecordStore for JsonlRecordStore {
    async fn record_outbound(&self, record: &OutboundRecord) -> Result<(), StoreError> {
        self.append(&LogLine {
            timestamp: Utc::now(),
            direction: "outbound",
            record: Some(record),
            replied_message_id: None,
        })
        .await
    }

    async fn mark_replied(&self, message_id: &str) -> Result<(), StoreError> {
        self.append(&LogLine {
            timestamp: Utc::now(),
            direction: "replied",
            record: None,
            replied_message_id: Some(message_id),
        })
        .await
    }
}
