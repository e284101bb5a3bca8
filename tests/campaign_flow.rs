//! End-to-end campaign flow: schedule against a file-backed tracker,
//! restart from disk, then drain the queue through a fake transport.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use outreach::campaign::run_campaign;
use outreach::config::{SchedulerConfig, SendPolicy, SenderConfig};
use outreach::distributor::policy::Randomized;
use outreach::error::{StoreError, TransportError};
use outreach::model::{EmailPayload, EmailStatus, ScheduleDay};
use outreach::sendloop::sweep;
use outreach::store::{JsonFileStore, TrackerStore};
use outreach::transport::{
    MailTransport, OutboundRecord, OutboundRecordStore, ProviderHeaders,
};

struct FakeTransport {
    calls: AtomicUsize,
}

impl FakeTransport {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn send(
        &self,
        _identity: &str,
        _recipient: &str,
        _subject: &str,
        _body: &str,
        _timezone: &str,
        _headers: &HashMap<String, String>,
    ) -> Result<ProviderHeaders, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderHeaders {
            message_id: Some(format!("m{call}")),
            conversation_id: Some(format!("VF_test_{call}")),
            thread_id: None,
        })
    }
}

#[derive(Default)]
struct MemoryRecords {
    rows: Mutex<Vec<OutboundRecord>>,
}

#[async_trait]
impl OutboundRecordStore for MemoryRecords {
    async fn record_outbound(&self, record: &OutboundRecord) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn mark_replied(&self, _message_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

fn email(i: usize) -> EmailPayload {
    EmailPayload {
        recipients: vec![format!("prospect{i}@example.nl")],
        subject: format!("Intro {i}"),
        body: "Hello there".into(),
        timezone: "Europe/Amsterdam".into(),
        language: "en".into(),
        campaign_id: None,
    }
}

fn sender(identity: &str, limit: u32) -> SenderConfig {
    SenderConfig {
        identity: identity.into(),
        daily_limit: limit,
        region: "netherland".into(),
        credentials_ref: None,
    }
}

/// One sender with a daily limit of 2 takes a 3-email batch: two land on the
/// first available schedule day, the third spills to the next, nothing
/// violates the 20-minute gap, and the plan survives a reload from disk.
#[tokio::test]
async fn overflow_campaign_schedules_sends_and_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("tracker.json"));
    let transport = FakeTransport::new();
    let records = MemoryRecords::default();
    let mut selector = Randomized::seeded(11);
    let cfg = SchedulerConfig::default();

    let senders = vec![sender("only@x.nl", 2)];
    let emails = vec![email(0), email(1), email(2)];

    run_campaign(
        "camp-1",
        emails,
        &senders,
        &store,
        &transport,
        &records,
        &mut selector,
        &SendPolicy::default(),
        &cfg,
    )
    .await
    .unwrap();

    // Reload from disk: this is the recovery boundary.
    let mut tracker = store.load().await;
    let account = &tracker.sending_accounts["only@x.nl"];

    assert_eq!(tracker.campaigns["camp-1"].total_emails, 3);
    assert_eq!(tracker.campaigns["camp-1"].emails_scheduled, 3);

    // Whatever was not yet due stays pending in the queue.
    let pending: Vec<DateTime<Utc>> = account
        .email_queue
        .iter()
        .filter(|e| e.status == EmailStatus::Pending)
        .map(|e| e.scheduled_time)
        .collect();
    let already_sent = tracker.campaigns["camp-1"].emails_sent;
    assert_eq!(pending.len() + already_sent, 3);

    // Daily quota: two distinct schedule days, counts 2 and 1.
    let mut counts: Vec<u32> = account
        .daily_schedule_count
        .values()
        .copied()
        .filter(|c| *c > 0)
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2]);
    for count in account.daily_schedule_count.values() {
        assert!(*count <= account.daily_limit);
    }

    // Pairwise minimum gap across the whole plan.
    let mut times: Vec<DateTime<Utc>> = account
        .email_queue
        .iter()
        .map(|e| e.scheduled_time)
        .collect();
    times.sort_unstable();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::minutes(20));
    }

    // The overflow email sits on a later schedule day than the first one.
    if times.len() == 3 {
        assert!(ScheduleDay::containing(times[2]) > ScheduleDay::containing(times[0]));
    }

    // Fast-forward past the last scheduled instant and drain.
    let far_future = times.last().copied().unwrap_or_else(Utc::now) + Duration::minutes(1);
    let processed = sweep(
        &mut tracker,
        &store,
        &transport,
        &records,
        &SendPolicy::default(),
        far_future,
    )
    .await
    .unwrap();

    assert_eq!(processed + already_sent, 3);
    assert_eq!(tracker.campaigns["camp-1"].emails_sent, 3);
    assert_eq!(tracker.campaigns["camp-1"].emails_failed, 0);
    assert!(tracker.sending_accounts["only@x.nl"].email_queue.is_empty());
    assert_eq!(records.rows.lock().unwrap().len(), 3);

    // The post-drain state was persisted; a second restart sees it.
    let after = store.load().await;
    assert_eq!(after.campaigns["camp-1"].emails_sent, 3);
    assert!(after.sending_accounts["only@x.nl"].email_queue.is_empty());
}

/// An empty sender set aborts the run before touching the tracker.
#[tokio::test]
async fn campaign_without_senders_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("tracker.json"));
    let transport = FakeTransport::new();
    let records = MemoryRecords::default();
    let mut selector = Randomized::seeded(1);

    let result = run_campaign(
        "camp-2",
        vec![email(0)],
        &[],
        &store,
        &transport,
        &records,
        &mut selector,
        &SendPolicy::default(),
        &SchedulerConfig::default(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    assert!(!store.path().exists());
}

/// Invalid payloads are dropped at submission; the rest proceed.
#[tokio::test]
async fn invalid_payloads_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("tracker.json"));
    let transport = FakeTransport::new();
    let records = MemoryRecords::default();
    let mut selector = Randomized::seeded(5);

    let mut bad = email(9);
    bad.recipients.clear();

    run_campaign(
        "camp-3",
        vec![email(0), bad, email(1)],
        &[sender("a@x.nl", 30)],
        &store,
        &transport,
        &records,
        &mut selector,
        &SendPolicy::default(),
        &SchedulerConfig::default(),
    )
    .await
    .unwrap();

    let tracker = store.load().await;
    assert_eq!(tracker.campaigns["camp-3"].total_emails, 2);
    assert_eq!(tracker.campaigns["camp-3"].emails_scheduled, 2);
}
