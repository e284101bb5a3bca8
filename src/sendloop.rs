//! The persisted send loop — dequeues due items, invokes the transport,
//! updates counters, and persists after every change.
//!
//! One logical worker owns the tracker for the whole loop; persistence
//! after every mutation is the recovery mechanism. A crash between a
//! transport success and the following save can lose the outbound record
//! but never double-send, because the item is already gone from the
//! in-memory queue when the next save lands.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::{SchedulerConfig, SendPolicy};
use crate::error::StoreError;
use crate::model::{EmailStatus, ScheduledEmail, Tracker};
use crate::store::TrackerStore;
use crate::transport::{MailTransport, OutboundRecord, OutboundRecordStore, ProviderHeaders};

/// Run sweeps until no pending item is due, sleeping `sweep_interval`
/// between sweeps.
pub async fn run_send_loop(
    tracker: &mut Tracker,
    store: &dyn TrackerStore,
    transport: &dyn MailTransport,
    records: &dyn OutboundRecordStore,
    policy: &SendPolicy,
    cfg: &SchedulerConfig,
) -> Result<(), StoreError> {
    loop {
        let now = Utc::now();
        let processed = sweep(tracker, store, transport, records, policy, now).await?;
        if !has_due_pending(tracker, Utc::now()) {
            info!(processed, "Send loop drained of due items, stopping");
            return Ok(());
        }
        tokio::time::sleep(cfg.sweep_interval).await;
    }
}

/// One pass over every sender queue: send everything due at `now`.
/// Returns the number of items processed (sent or failed).
pub async fn sweep(
    tracker: &mut Tracker,
    store: &dyn TrackerStore,
    transport: &dyn MailTransport,
    records: &dyn OutboundRecordStore,
    policy: &SendPolicy,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let identities: Vec<String> = tracker.sending_accounts.keys().cloned().collect();
    let mut processed = 0usize;

    for identity in identities {
        while let Some(mut item) = take_due_item(tracker, &identity, now) {
            let delivered = attempt_delivery(transport, &identity, &mut item, policy, now).await;

            match delivered {
                Some(headers) => {
                    item.status = EmailStatus::Sent;
                    let record = outbound_record(&identity, &item, &headers, now);
                    // Record keeping is not transactional with queue removal;
                    // a failure here is logged and the send still counts.
                    if let Err(e) = records.record_outbound(&record).await {
                        error!(identity, error = %e, "Failed to record outbound email");
                    }
                    match tracker.campaign_mut(&item.campaign_id) {
                        Ok(campaign) => campaign.emails_sent += 1,
                        Err(e) => warn!(error = %e, "Sent email with no campaign entry"),
                    }
                }
                None => {
                    item.status = EmailStatus::Failed;
                    match tracker.campaign_mut(&item.campaign_id) {
                        Ok(campaign) => campaign.emails_failed += 1,
                        Err(e) => warn!(error = %e, "Failed email with no campaign entry"),
                    }
                }
            }

            tracker.touch(now);
            store.save(tracker).await?;
            processed += 1;
        }
    }

    Ok(processed)
}

/// Whether any queue still holds a pending item due at `now`.
pub fn has_due_pending(tracker: &Tracker, now: DateTime<Utc>) -> bool {
    tracker.sending_accounts.values().any(|account| {
        account
            .email_queue
            .iter()
            .any(|item| item.status == EmailStatus::Pending && item.scheduled_time <= now)
    })
}

/// Remove and return the first due pending item from `identity`'s queue.
fn take_due_item(tracker: &mut Tracker, identity: &str, now: DateTime<Utc>) -> Option<ScheduledEmail> {
    let account = tracker.sending_accounts.get_mut(identity)?;
    let index = account
        .email_queue
        .iter()
        .position(|item| item.status == EmailStatus::Pending && item.scheduled_time <= now)?;
    Some(account.email_queue.remove(index))
}

/// Try delivery up to `1 + retry_limit` times. `None` means all attempts
/// failed.
async fn attempt_delivery(
    transport: &dyn MailTransport,
    identity: &str,
    item: &mut ScheduledEmail,
    policy: &SendPolicy,
    now: DateTime<Utc>,
) -> Option<ProviderHeaders> {
    let recipient = item.payload.recipients.first().cloned().unwrap_or_default();
    let mut headers = HashMap::new();
    headers.insert("Thread-Topic".to_string(), item.payload.subject.clone());

    for attempt in 0..=policy.retry_limit {
        item.attempt_count += 1;
        item.last_attempt = Some(now);

        match transport
            .send(
                identity,
                &recipient,
                &item.payload.subject,
                &item.payload.body,
                &item.payload.timezone,
                &headers,
            )
            .await
        {
            Ok(provider) => return Some(provider),
            Err(e) => warn!(identity, recipient = %recipient, attempt, error = %e, "Transport failure"),
        }
    }
    None
}

fn outbound_record(
    identity: &str,
    item: &ScheduledEmail,
    headers: &ProviderHeaders,
    now: DateTime<Utc>,
) -> OutboundRecord {
    OutboundRecord {
        sender: identity.to_string(),
        recipient: item.payload.recipients.first().cloned().unwrap_or_default(),
        subject: item.payload.subject.clone(),
        body: item.payload.body.clone(),
        created_at: now,
        time_zone: item.payload.timezone.clone(),
        thread_topic: item.payload.subject.clone(),
        message_id: headers.message_id.clone(),
        conversation_id: headers.conversation_id.clone(),
        campaign_id: item.campaign_id.clone(),
    }
}
