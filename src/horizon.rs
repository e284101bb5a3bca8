//! Scheduling horizon — an expandable set of multi-day time windows
//! exposing discrete 20-minute candidate slots.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::calendar;
use crate::config::SchedulerConfig;
use crate::model::ScheduleDay;

/// A contiguous `[start, end)` horizon segment tracking the instants
/// already claimed within it.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    claimed: Vec<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            claimed: Vec::new(),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Whether `instant` keeps the minimum gap to every claimed instant in
    /// this window. Overlap is only checked within a window, not across.
    pub fn is_slot_free(&self, instant: DateTime<Utc>, min_gap: Duration) -> bool {
        self.claimed
            .iter()
            .all(|claimed| (instant - *claimed).abs() >= min_gap)
    }

    /// Register a committed slot.
    pub fn claim(&mut self, instant: DateTime<Utc>) {
        self.claimed.push(instant);
    }

    /// Free candidate slots in this window that land on `day` and inside the
    /// recipient's business hours.
    fn slots_for_day(&self, tz: Tz, day: ScheduleDay, cfg: &SchedulerConfig) -> Vec<DateTime<Utc>> {
        let mut slots = Vec::new();
        let mut current = self.start;
        while current < self.end {
            if ScheduleDay::containing(current) == day
                && calendar::is_valid_instant(current, tz, &cfg.rules)
                && self.is_slot_free(current, cfg.rules.min_gap)
            {
                slots.push(current);
            }
            current += cfg.slot_interval;
        }
        slots
    }
}

/// Ordered windows from "now" forward. Grows on demand, never shrinks.
#[derive(Debug, Clone)]
pub struct Horizon {
    windows: Vec<TimeWindow>,
}

impl Horizon {
    /// A horizon of one window spanning `days` from `start`.
    pub fn new(start: DateTime<Utc>, days: i64) -> Self {
        Self {
            windows: vec![TimeWindow::new(start, start + Duration::days(days))],
        }
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    /// Total days currently spanned.
    pub fn span_days(&self) -> i64 {
        self.windows
            .iter()
            .map(|w| (w.end - w.start).num_days())
            .sum()
    }

    /// Append one window of `additional_days` starting where the last one
    /// ended.
    pub fn extend(&mut self, additional_days: i64) {
        let last_end = match self.windows.last() {
            Some(window) => window.end,
            None => Utc::now(),
        };
        self.windows
            .push(TimeWindow::new(last_end, last_end + Duration::days(additional_days)));
    }

    /// Grow the horizon if `batch_size` exceeds its total capacity
    /// (`days × senders × per-sender daily limit`).
    pub fn ensure_capacity(&mut self, batch_size: usize, sender_count: usize, cfg: &SchedulerConfig) {
        let capacity = total_capacity(cfg.horizon_days, sender_count, cfg.default_daily_limit);
        if batch_size <= capacity {
            return;
        }
        let per_day = sender_count * cfg.default_daily_limit as usize;
        if per_day == 0 {
            return;
        }
        let days_needed = batch_size.div_ceil(per_day) as i64;
        let additional = days_needed - cfg.horizon_days;
        if additional > 0 {
            info!(additional, "Extending scheduling horizon");
            self.extend(additional);
        }
    }

    /// Free candidate slots across all windows for `day`, ascending.
    pub fn slots_for_day(&self, tz: Tz, day: ScheduleDay, cfg: &SchedulerConfig) -> Vec<DateTime<Utc>> {
        let mut slots: Vec<DateTime<Utc>> = self
            .windows
            .iter()
            .flat_map(|w| w.slots_for_day(tz, day, cfg))
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Register a committed slot with the window that contains it.
    pub fn claim(&mut self, instant: DateTime<Utc>) {
        if let Some(window) = self.windows.iter_mut().find(|w| w.contains(instant)) {
            window.claim(instant);
        }
    }
}

/// Total email capacity for `days` across `sender_count` senders.
pub fn total_capacity(days: i64, sender_count: usize, per_sender_daily: u32) -> usize {
    days.max(0) as usize * sender_count * per_sender_daily as usize
}
