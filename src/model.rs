//! Scheduling data model — the persisted tracker aggregate and its parts.
//!
//! Field names mirror the persisted JSON shape exactly so the tracker file
//! stays backward-readable; unknown fields are ignored on load and missing
//! ones defaulted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A 24-hour accounting bucket running 7:00–7:00 UTC.
///
/// Instants before 7:00 UTC belong to the previous schedule day. Keyed as
/// `YYYY-MM-DD` in the persisted daily count maps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScheduleDay(pub NaiveDate);

impl ScheduleDay {
    /// The schedule-day boundary hour, in UTC.
    pub const BOUNDARY_HOUR: u32 = 7;

    /// The schedule day containing `instant`.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let date = if instant.hour() < Self::BOUNDARY_HOUR {
            instant.date_naive() - Days::new(1)
        } else {
            instant.date_naive()
        };
        Self(date)
    }

    /// The following schedule day.
    pub fn next(self) -> Self {
        Self(self.0 + Days::new(1))
    }
}

impl fmt::Display for ScheduleDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Opaque email payload carried through scheduling untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPayload {
    /// Recipient addresses; the first one drives region affinity.
    #[serde(rename = "email_recipient")]
    pub recipients: Vec<String>,
    #[serde(rename = "subjectline")]
    pub subject: String,
    #[serde(rename = "email_content")]
    pub body: String,
    /// IANA timezone of the recipient.
    #[serde(rename = "time_zone", alias = "timezone", default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

fn default_timezone() -> String {
    "Europe/Amsterdam".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// Delivery status of a scheduled email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
}

/// One outbound message instance sitting in a sender's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEmail {
    pub campaign_id: String,
    /// UTC instant the email is due; validated against the recipient's
    /// business hours at creation time.
    pub scheduled_time: DateTime<Utc>,
    /// The scheduled instant expressed in the recipient's local offset.
    #[serde(rename = "recipient_time")]
    pub recipient_local_time: DateTime<FixedOffset>,
    pub status: EmailStatus,
    pub attempt_count: u32,
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(rename = "email_data")]
    pub payload: EmailPayload,
}

/// Per-identity schedule state and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderAccount {
    pub daily_limit: u32,
    /// Minimum minutes between sends from this identity.
    pub time_between_emails: u32,
    pub emails_sent_today: u32,
    pub last_reset_date: NaiveDate,
    pub last_scheduled_time: DateTime<Utc>,
    /// Schedule day → committed assignment count. Gapless from "today" to
    /// the furthest day touched (absent days are back-filled at zero).
    #[serde(default)]
    pub daily_schedule_count: BTreeMap<ScheduleDay, u32>,
    /// Insertion order is schedule order.
    #[serde(default)]
    pub email_queue: Vec<ScheduledEmail>,
    #[serde(default)]
    pub region: String,
}

impl SenderAccount {
    /// A fresh account with today's count at zero and an empty queue.
    pub fn new(daily_limit: u32, region: &str, now: DateTime<Utc>) -> Self {
        let mut daily_schedule_count = BTreeMap::new();
        daily_schedule_count.insert(ScheduleDay::containing(now), 0);
        Self {
            daily_limit,
            time_between_emails: 20,
            emails_sent_today: 0,
            last_reset_date: now.date_naive(),
            last_scheduled_time: now,
            daily_schedule_count,
            email_queue: Vec::new(),
            region: region.to_string(),
        }
    }
}

/// Campaign lifecycle status. Transitions are advisory, not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    New,
    InProgress,
    Completed,
    Failed,
}

/// Progress counters for one campaign submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignTracker {
    pub created_at: DateTime<Utc>,
    pub total_emails: usize,
    pub emails_scheduled: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub status: CampaignStatus,
}

impl CampaignTracker {
    pub fn new(total_emails: usize, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            total_emails,
            emails_scheduled: 0,
            emails_sent: 0,
            emails_failed: 0,
            status: CampaignStatus::New,
        }
    }
}

/// Tracker file metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerMeta {
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

/// Root aggregate — the single unit of persistence.
///
/// Shared mutable state is protected by single-writer discipline plus
/// save-after-every-mutation, not in-memory locking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    #[serde(default)]
    pub sending_accounts: BTreeMap<String, SenderAccount>,
    #[serde(default)]
    pub campaigns: BTreeMap<String, CampaignTracker>,
    pub meta: TrackerMeta,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            sending_accounts: BTreeMap::new(),
            campaigns: BTreeMap::new(),
            meta: TrackerMeta {
                last_updated: Utc::now(),
                version: "1.0".to_string(),
            },
        }
    }
}
