//! Collaborator seams: mail transport and the persistent record store.
//!
//! Both are black boxes to the scheduling core. The core only needs
//! "attempt delivery" and "insert outbound record / mark replied".

mod smtp;

pub use smtp::{SmtpConfig, SmtpMailTransport};

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, TransportError};

/// Provider-assigned identifiers returned on successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderHeaders {
    pub message_id: Option<String>,
    pub conversation_id: Option<String>,
    pub thread_id: Option<String>,
}

/// Attempts delivery through one of the configured identities.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        identity: &str,
        recipient: &str,
        subject: &str,
        body: &str,
        timezone: &str,
        headers: &HashMap<String, String>,
    ) -> Result<ProviderHeaders, TransportError>;
}

/// One row for the persistent record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRecord {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub time_zone: String,
    pub thread_topic: String,
    pub message_id: Option<String>,
    pub conversation_id: Option<String>,
    pub campaign_id: String,
}

/// Black-box record keeping for sent and replied messages.
#[async_trait]
pub trait OutboundRecordStore: Send + Sync {
    /// Insert one outbound record.
    async fn record_outbound(&self, record: &OutboundRecord) -> Result<(), StoreError>;

    /// Mark the original message with `message_id` as replied.
    async fn mark_replied(&self, message_id: &str) -> Result<(), StoreError>;
}

/// Strip every leading "Re:" prefix variation from a subject.
pub fn clean_subject(subject: &str) -> String {
    let mut cleaned = subject.trim();
    loop {
        let lower = cleaned.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("re:") {
            let skipped = cleaned.len() - rest.len();
            cleaned = cleaned[skipped..].trim_start();
        } else {
            break;
        }
    }
    cleaned.trim().to_string()
}

/// Generate a unique conversation id for a new thread.
pub fn generate_conversation_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("VF_{}_{}", Utc::now().timestamp(), &suffix[..8])
}
