//! Slot allocation — finds the earliest instant satisfying business hours,
//! the minimum gap, and the sender's remaining daily quota.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::calendar;
use crate::config::SchedulerConfig;
use crate::error::TrackerError;
use crate::horizon::Horizon;
use crate::model::{EmailPayload, ScheduleDay, ScheduledEmail, Tracker};

/// Find the earliest free slot for `email` on `identity`'s schedule.
///
/// Walks schedule days starting from the one containing `now`, bounded to
/// `max_days_tried` distinct days. Exhaustion is an expected outcome and
/// returns `None`; the caller logs and skips the email.
pub fn find_slot(
    email: &EmailPayload,
    horizon: &Horizon,
    sender_queue: &[ScheduledEmail],
    tracker: &mut Tracker,
    identity: &str,
    now: DateTime<Utc>,
    cfg: &SchedulerConfig,
) -> Result<Option<DateTime<Utc>>, TrackerError> {
    let tz = calendar::parse_timezone(&email.timezone);
    let daily_limit = tracker.account(identity)?.daily_limit;

    let mut current_day = ScheduleDay::containing(now);
    let mut days_tried: HashSet<ScheduleDay> = HashSet::new();

    while days_tried.len() < cfg.max_days_tried {
        let target_day = tracker.next_available_day(identity, current_day)?;
        if !days_tried.insert(target_day) {
            current_day = target_day.next();
            continue;
        }

        for slot in horizon.slots_for_day(tz, target_day, cfg) {
            if keeps_min_gap(sender_queue, slot, cfg.rules.min_gap)
                && trailing_day_load(sender_queue, slot) < daily_limit
            {
                return Ok(Some(slot));
            }
        }

        debug!(identity, day = %target_day, "No free slot on day, advancing");
        current_day = target_day.next();
    }

    Ok(None)
}

/// Whether `slot` keeps the minimum gap to every email already queued.
fn keeps_min_gap(queue: &[ScheduledEmail], slot: DateTime<Utc>, min_gap: Duration) -> bool {
    queue
        .iter()
        .all(|email| (slot - email.scheduled_time).abs() >= min_gap)
}

/// Queue entries scheduled in the trailing 24 hours `[slot - 24h, slot]`.
fn trailing_day_load(queue: &[ScheduledEmail], slot: DateTime<Utc>) -> u32 {
    let window_start = slot - Duration::hours(24);
    queue
        .iter()
        .filter(|email| window_start <= email.scheduled_time && email.scheduled_time <= slot)
        .count() as u32
}
