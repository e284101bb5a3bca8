//! Batch assignment of emails to senders.
//!
//! Two strategies: a deterministic even split with region affinity, and the
//! randomized optimized scheduler used for large campaigns. The optimized
//! path balances load probabilistically; the allocator's capacity checks are
//! the true invariant enforcers, not the selection order.

pub mod policy;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::allocator::find_slot;
use crate::calendar;
use crate::config::{SchedulerConfig, SenderConfig, SendingRules};
use crate::error::{DistributeError, Error, TrackerError};
use crate::horizon::Horizon;
use crate::model::{EmailPayload, EmailStatus, ScheduleDay, ScheduledEmail, Tracker};

use policy::SenderSelector;

/// Region tag inferred from a recipient's email domain, if any.
fn region_hint(recipient: &str) -> Option<&'static str> {
    let domain = recipient.rsplit('@').next().unwrap_or(recipient);
    if domain.ends_with(".de") {
        Some("germany")
    } else if domain.ends_with(".nl") {
        Some("netherland")
    } else {
        None
    }
}

/// Deterministic even split: partition the batch as evenly as possible,
/// honoring region affinity first, then the lowest assigned/target ratio.
///
/// Scheduled times chain from `start_time` with the minimum gap between
/// consecutive assignments, each run through the business-hours calendar.
/// An email no sender can take is dropped with a warning.
pub fn distribute(
    emails: &[EmailPayload],
    senders: &[SenderConfig],
    start_time: DateTime<Utc>,
    campaign_id: &str,
    rules: &SendingRules,
) -> Result<BTreeMap<String, Vec<ScheduledEmail>>, DistributeError> {
    if senders.is_empty() {
        return Err(DistributeError::NoSenders);
    }

    let base = emails.len() / senders.len();
    let remainder = emails.len() % senders.len();
    let mut targets: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, sender) in senders.iter().enumerate() {
        let extra = usize::from(i < remainder);
        targets.insert(sender.identity.as_str(), base + extra);
    }

    let mut assigned: BTreeMap<&str, usize> = senders
        .iter()
        .map(|s| (s.identity.as_str(), 0))
        .collect();
    let mut distribution: BTreeMap<String, Vec<ScheduledEmail>> = senders
        .iter()
        .map(|s| (s.identity.clone(), Vec::new()))
        .collect();

    let mut cursor = start_time;

    for email in emails {
        let Some(identity) = best_sender(email, senders, &targets, &assigned) else {
            warn!(recipient = ?email.recipients.first(), "No sender available, dropping email");
            continue;
        };

        let tz = calendar::parse_timezone(&email.timezone);
        cursor = calendar::next_valid_instant(cursor + rules.min_gap, tz, rules);

        let entry = ScheduledEmail {
            campaign_id: campaign_id.to_string(),
            scheduled_time: cursor,
            recipient_local_time: cursor.with_timezone(&tz).fixed_offset(),
            status: EmailStatus::Pending,
            attempt_count: 0,
            last_attempt: None,
            payload: email.clone(),
        };

        *assigned.entry(identity.as_str()).or_insert(0) += 1;
        distribution
            .entry(identity.clone())
            .or_default()
            .push(entry);
    }

    Ok(distribution)
}

/// Pick the sender for one email: region-affine senders with spare target
/// first, then the lowest assigned/target ratio among all eligible senders.
fn best_sender<'a>(
    email: &EmailPayload,
    senders: &'a [SenderConfig],
    targets: &BTreeMap<&str, usize>,
    assigned: &BTreeMap<&str, usize>,
) -> Option<&'a String> {
    let recipient = email.recipients.first().map(String::as_str).unwrap_or("");

    if let Some(region) = region_hint(recipient) {
        let regional: Vec<&SenderConfig> =
            senders.iter().filter(|s| s.region == region).collect();
        if let Some(choice) = lowest_ratio(&regional, targets, assigned) {
            return Some(choice);
        }
    }

    let all: Vec<&SenderConfig> = senders.iter().collect();
    lowest_ratio(&all, targets, assigned)
}

fn lowest_ratio<'a>(
    candidates: &[&'a SenderConfig],
    targets: &BTreeMap<&str, usize>,
    assigned: &BTreeMap<&str, usize>,
) -> Option<&'a String> {
    candidates
        .iter()
        .filter(|s| {
            let target = targets.get(s.identity.as_str()).copied().unwrap_or(0);
            let used = assigned.get(s.identity.as_str()).copied().unwrap_or(0);
            used < target
        })
        .min_by(|a, b| ratio_of(a, targets, assigned).total_cmp(&ratio_of(b, targets, assigned)))
        .map(|s| &s.identity)
}

fn ratio_of(
    sender: &SenderConfig,
    targets: &BTreeMap<&str, usize>,
    assigned: &BTreeMap<&str, usize>,
) -> f64 {
    let target = targets
        .get(sender.identity.as_str())
        .copied()
        .unwrap_or(1)
        .max(1);
    let used = assigned.get(sender.identity.as_str()).copied().unwrap_or(0);
    used as f64 / target as f64
}

/// Randomized optimized scheduling for large campaigns.
///
/// Shuffles the batch, then samples senders through the selection policy
/// (up to `3 × senders` attempts per email), asking the allocator for a
/// slot. Commits re-check capacity and re-validate recipient business hours
/// at the exact committed instant. Returns the number of emails scheduled.
#[allow(clippy::too_many_arguments)]
pub fn schedule_optimized(
    emails: &[EmailPayload],
    senders: &[SenderConfig],
    tracker: &mut Tracker,
    horizon: &mut Horizon,
    campaign_id: &str,
    selector: &mut dyn SenderSelector,
    rng: &mut StdRng,
    now: DateTime<Utc>,
    cfg: &SchedulerConfig,
) -> Result<usize, Error> {
    if senders.is_empty() {
        return Err(DistributeError::NoSenders.into());
    }

    for sender in senders {
        tracker.initialize_sender(&sender.identity, sender.daily_limit, &sender.region, now);
    }
    horizon.ensure_capacity(emails.len(), senders.len(), cfg);

    let identities: Vec<String> = senders.iter().map(|s| s.identity.clone()).collect();
    let max_attempts = identities.len() * 3;

    let mut order: Vec<&EmailPayload> = emails.iter().collect();
    order.shuffle(rng);

    let mut cursor = now;
    let mut scheduled_count = 0usize;

    for email in order {
        let mut committed = false;
        let mut attempts = 0usize;

        while !committed && attempts < max_attempts {
            let Some(identity) = selector.next(&identities, tracker) else {
                break;
            };

            let queue = tracker.account(&identity)?.email_queue.clone();
            let slot = find_slot(email, horizon, &queue, tracker, &identity, cursor, cfg)?;

            if let Some(slot) = slot {
                let day = ScheduleDay::containing(slot);
                if tracker.remaining_capacity(&identity, day)? > 0 {
                    commit(email, &identity, slot, tracker, horizon, campaign_id, now, cfg)?;
                    scheduled_count += 1;
                    committed = true;
                    continue;
                }
            }

            attempts += 1;
            if attempts % identities.len() == 0 {
                // Every sender struck out; move the whole search forward a day.
                cursor += Duration::days(1);
                debug!(day = %ScheduleDay::containing(cursor), "All senders tried, advancing cursor");
            }
        }

        if !committed {
            warn!(
                recipient = ?email.recipients.first(),
                attempts, "Failed to find slot, skipping email"
            );
        }
    }

    match tracker.campaign_mut(campaign_id) {
        Ok(campaign) => campaign.emails_scheduled = scheduled_count,
        Err(_) => debug!(campaign_id, "No campaign entry to update"),
    }
    tracker.touch(now);

    info!(scheduled_count, total = emails.len(), "Optimized scheduling complete");
    Ok(scheduled_count)
}

/// Commit one assignment: queue append, last-scheduled update, day count
/// increment, and horizon claim.
#[allow(clippy::too_many_arguments)]
fn commit(
    email: &EmailPayload,
    identity: &str,
    slot: DateTime<Utc>,
    tracker: &mut Tracker,
    horizon: &mut Horizon,
    campaign_id: &str,
    now: DateTime<Utc>,
    cfg: &SchedulerConfig,
) -> Result<(), TrackerError> {
    let tz = calendar::parse_timezone(&email.timezone);

    // Re-validate at the exact committed instant; drift can only come from
    // clock/DST edges, which is acceptable but worth a trace.
    if !calendar::is_valid_instant(slot, tz, &cfg.rules) {
        warn!(%slot, timezone = %email.timezone, "Committed slot drifted outside business hours");
    }

    tracker.record_assignment(identity, slot, now)?;

    let entry = ScheduledEmail {
        campaign_id: campaign_id.to_string(),
        scheduled_time: slot,
        recipient_local_time: slot.with_timezone(&tz).fixed_offset(),
        status: EmailStatus::Pending,
        attempt_count: 0,
        last_attempt: None,
        payload: email.clone(),
    };

    let account = tracker.account_mut(identity)?;
    account.email_queue.push(entry);
    account.last_scheduled_time = slot;
    horizon.claim(slot);

    debug!(identity, %slot, "Scheduled email");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;

    use policy::Randomized;

    fn now() -> DateTime<Utc> {
        // Monday 2025-03-10, 08:00 UTC.
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    fn sender(identity: &str, region: &str, limit: u32) -> SenderConfig {
        SenderConfig {
            identity: identity.to_string(),
            daily_limit: limit,
            region: region.to_string(),
            credentials_ref: None,
        }
    }

    fn email_to(recipient: &str) -> EmailPayload {
        EmailPayload {
            recipients: vec![recipient.to_string()],
            subject: "Intro".into(),
            body: "Hello".into(),
            timezone: "Europe/Amsterdam".into(),
            language: "en".into(),
            campaign_id: None,
        }
    }

    #[test]
    fn even_split_within_one_of_each_other() {
        let emails: Vec<EmailPayload> = (0..100)
            .map(|i| email_to(&format!("user{i}@example.com")))
            .collect();
        let senders = vec![
            sender("a@x.com", "global", 30),
            sender("b@x.com", "global", 30),
            sender("c@x.com", "global", 30),
        ];
        let rules = SendingRules::default();
        let result = distribute(&emails, &senders, now(), "c1", &rules).unwrap();

        let counts: Vec<usize> = result.values().map(Vec::len).collect();
        assert_eq!(counts.iter().sum::<usize>(), 100);
        for a in &counts {
            for b in &counts {
                assert!(a.abs_diff(*b) <= 1, "uneven split: {counts:?}");
            }
        }
    }

    #[test]
    fn german_recipients_prefer_germany_senders() {
        let emails = vec![email_to("kunde@firma.de")];
        let senders = vec![
            sender("nl@x.com", "netherland", 30),
            sender("de@x.com", "germany", 30),
        ];
        let rules = SendingRules::default();
        let result = distribute(&emails, &senders, now(), "c1", &rules).unwrap();
        assert_eq!(result["de@x.com"].len(), 1);
        assert!(result["nl@x.com"].is_empty());
    }

    #[test]
    fn region_overflow_falls_back_to_least_loaded() {
        let emails = vec![
            email_to("a@firma.de"),
            email_to("b@firma.de"),
            email_to("c@firma.de"),
        ];
        // Targets: 2 for the germany sender, 1 for the dutch one.
        let senders = vec![
            sender("de@x.com", "germany", 30),
            sender("nl@x.com", "netherland", 30),
        ];
        let rules = SendingRules::default();
        let result = distribute(&emails, &senders, now(), "c1", &rules).unwrap();
        assert_eq!(result["de@x.com"].len(), 2);
        assert_eq!(result["nl@x.com"].len(), 1);
    }

    #[test]
    fn chained_times_keep_the_gap_and_business_hours() {
        let emails: Vec<EmailPayload> = (0..5)
            .map(|i| email_to(&format!("user{i}@example.com")))
            .collect();
        let senders = vec![sender("a@x.com", "global", 30)];
        let rules = SendingRules::default();
        let result = distribute(&emails, &senders, now(), "c1", &rules).unwrap();
        let queue = &result["a@x.com"];
        let tz = calendar::parse_timezone("Europe/Amsterdam");
        for entry in queue {
            assert!(calendar::is_valid_instant(entry.scheduled_time, tz, &rules));
        }
        for pair in queue.windows(2) {
            assert!(pair[1].scheduled_time - pair[0].scheduled_time >= rules.min_gap);
        }
    }

    #[test]
    fn empty_sender_set_is_fatal() {
        let emails = vec![email_to("x@y.com")];
        let rules = SendingRules::default();
        assert!(matches!(
            distribute(&emails, &[], now(), "c1", &rules),
            Err(DistributeError::NoSenders)
        ));
    }

    #[test]
    fn optimized_schedules_whole_batch_within_capacity() {
        let emails: Vec<EmailPayload> = (0..12)
            .map(|i| email_to(&format!("user{i}@example.com")))
            .collect();
        let senders = vec![
            sender("a@x.com", "global", 30),
            sender("b@x.com", "global", 30),
        ];
        let cfg = SchedulerConfig::default();
        let mut tracker = Tracker::default();
        tracker.create_campaign("c1", emails.len(), now());
        let mut horizon = Horizon::new(now(), cfg.horizon_days);
        let mut selector = Randomized::seeded(7);
        let mut rng = StdRng::seed_from_u64(7);

        let scheduled = schedule_optimized(
            &emails,
            &senders,
            &mut tracker,
            &mut horizon,
            "c1",
            &mut selector,
            &mut rng,
            now(),
            &cfg,
        )
        .unwrap();

        assert_eq!(scheduled, 12);
        assert_eq!(tracker.campaigns["c1"].emails_scheduled, 12);

        let queued: usize = tracker
            .sending_accounts
            .values()
            .map(|a| a.email_queue.len())
            .sum();
        assert_eq!(queued, 12);

        // Per-sender pairwise gap invariant.
        for account in tracker.sending_accounts.values() {
            for (i, a) in account.email_queue.iter().enumerate() {
                for b in &account.email_queue[i + 1..] {
                    assert!(
                        (a.scheduled_time - b.scheduled_time).abs() >= cfg.rules.min_gap,
                        "gap violation on one sender"
                    );
                }
            }
        }
    }

    #[test]
    fn optimized_respects_daily_limit_by_spilling_days() {
        let emails: Vec<EmailPayload> = (0..3)
            .map(|i| email_to(&format!("user{i}@example.com")))
            .collect();
        let senders = vec![sender("only@x.com", "global", 2)];
        let cfg = SchedulerConfig::default();
        let mut tracker = Tracker::default();
        tracker.create_campaign("c1", 3, now());
        let mut horizon = Horizon::new(now(), cfg.horizon_days);
        let mut selector = Randomized::seeded(3);
        let mut rng = StdRng::seed_from_u64(3);

        let scheduled = schedule_optimized(
            &emails,
            &senders,
            &mut tracker,
            &mut horizon,
            "c1",
            &mut selector,
            &mut rng,
            now(),
            &cfg,
        )
        .unwrap();
        assert_eq!(scheduled, 3);

        let account = tracker.account("only@x.com").unwrap();
        let today = ScheduleDay::containing(now());
        assert_eq!(account.daily_schedule_count[&today], 2);
        assert_eq!(account.daily_schedule_count[&today.next()], 1);

        // The overflow email spills onto the next schedule day, clear of the
        // trailing 24-hour window of the first two.
        let mut times: Vec<DateTime<Utc>> = account
            .email_queue
            .iter()
            .map(|e| e.scheduled_time)
            .collect();
        times.sort_unstable();
        assert_eq!(ScheduleDay::containing(times[2]), today.next());
        for (i, a) in times.iter().enumerate() {
            for b in &times[i + 1..] {
                assert!((*a - *b).abs() >= cfg.rules.min_gap);
            }
        }
    }
}
