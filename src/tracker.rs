//! Sender capacity tracking over the `Tracker` aggregate.
//!
//! All operations key daily counts by [`ScheduleDay`] (the 7:00–7:00 UTC
//! bucket), not calendar midnight. Unknown identities are programmer errors
//! and surface as [`TrackerError::NotInitialized`].

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::TrackerError;
use crate::model::{CampaignTracker, ScheduleDay, SenderAccount, Tracker};

impl Tracker {
    /// Lazily create a sender account. No-op if already present.
    pub fn initialize_sender(
        &mut self,
        identity: &str,
        daily_limit: u32,
        region: &str,
        now: DateTime<Utc>,
    ) {
        if self.sending_accounts.contains_key(identity) {
            return;
        }
        debug!(identity, daily_limit, "Initializing sender account");
        self.sending_accounts
            .insert(identity.to_string(), SenderAccount::new(daily_limit, region, now));
        self.touch(now);
    }

    /// Borrow a sender account.
    pub fn account(&self, identity: &str) -> Result<&SenderAccount, TrackerError> {
        self.sending_accounts
            .get(identity)
            .ok_or_else(|| TrackerError::NotInitialized(identity.to_string()))
    }

    /// Mutably borrow a sender account.
    pub fn account_mut(&mut self, identity: &str) -> Result<&mut SenderAccount, TrackerError> {
        self.sending_accounts
            .get_mut(identity)
            .ok_or_else(|| TrackerError::NotInitialized(identity.to_string()))
    }

    /// Record one committed assignment at `instant` for `identity`.
    ///
    /// Back-fills zero counts for every schedule day between "today" and the
    /// target day so the day axis stays gapless for lookahead. Refuses the
    /// increment with [`TrackerError::NoCapacity`] when the day is already
    /// at the daily limit, which keeps `count[day] <= daily_limit` total.
    pub fn record_assignment(
        &mut self,
        identity: &str,
        instant: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let target = ScheduleDay::containing(instant);
        let account = self.account_mut(identity)?;

        let mut day = ScheduleDay::containing(now);
        while day <= target {
            account.daily_schedule_count.entry(day).or_insert(0);
            day = day.next();
        }

        let limit = account.daily_limit;
        let count = account.daily_schedule_count.entry(target).or_insert(0);
        if *count >= limit {
            return Err(TrackerError::NoCapacity {
                identity: identity.to_string(),
                day: target,
            });
        }
        *count += 1;
        self.touch(now);
        Ok(())
    }

    /// Remaining assignments for `identity` on `day`, clamped at zero.
    /// A day not yet present counts as full capacity.
    pub fn remaining_capacity(
        &self,
        identity: &str,
        day: ScheduleDay,
    ) -> Result<u32, TrackerError> {
        let account = self.account(identity)?;
        let used = account.daily_schedule_count.get(&day).copied().unwrap_or(0);
        Ok(account.daily_limit.saturating_sub(used))
    }

    /// Walk forward from `from` to the first schedule day with remaining
    /// capacity, creating absent days at zero along the way.
    pub fn next_available_day(
        &mut self,
        identity: &str,
        from: ScheduleDay,
    ) -> Result<ScheduleDay, TrackerError> {
        let account = self.account_mut(identity)?;
        let mut day = from;
        loop {
            let count = *account.daily_schedule_count.entry(day).or_insert(0);
            if count < account.daily_limit {
                return Ok(day);
            }
            debug!(identity, %day, "Schedule day full, advancing");
            day = day.next();
        }
    }

    /// Create a campaign entry. Overwrites nothing: resubmitting an existing
    /// id keeps the original counters.
    pub fn create_campaign(&mut self, campaign_id: &str, total_emails: usize, now: DateTime<Utc>) {
        self.campaigns
            .entry(campaign_id.to_string())
            .or_insert_with(|| CampaignTracker::new(total_emails, now));
        self.touch(now);
    }

    /// Mutably borrow a campaign's counters.
    pub fn campaign_mut(&mut self, campaign_id: &str) -> Result<&mut CampaignTracker, TrackerError> {
        self.campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| TrackerError::UnknownCampaign(campaign_id.to_string()))
    }

    /// Refresh the aggregate's last-updated stamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.meta.last_updated = now;
    }
}
