//! Campaign submission entrypoint — validate, schedule, persist, send.

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::config::{SchedulerConfig, SendPolicy, SenderConfig};
use crate::distributor::policy::SenderSelector;
use crate::distributor::schedule_optimized;
use crate::error::{DistributeError, Result};
use crate::horizon::Horizon;
use crate::model::{CampaignStatus, EmailPayload};
use crate::sendloop::run_send_loop;
use crate::store::TrackerStore;
use crate::transport::{MailTransport, OutboundRecordStore};
use crate::validation;

/// Run one campaign end to end: load the tracker, schedule the batch
/// through the optimized scheduler, persist, then drain the send loop.
///
/// Invalid payloads are skipped with a warning; an empty sender set aborts
/// the whole run.
#[allow(clippy::too_many_arguments)]
pub async fn run_campaign(
    campaign_id: &str,
    emails: Vec<EmailPayload>,
    senders: &[SenderConfig],
    store: &dyn TrackerStore,
    transport: &dyn MailTransport,
    records: &dyn OutboundRecordStore,
    selector: &mut dyn SenderSelector,
    policy: &SendPolicy,
    cfg: &SchedulerConfig,
) -> Result<()> {
    if senders.is_empty() {
        return Err(DistributeError::NoSenders.into());
    }
    validation::validate_sending_rules(&cfg.rules)?;
    for sender in senders {
        validation::validate_sender_config(sender)?;
    }

    let emails: Vec<EmailPayload> = emails
        .into_iter()
        .filter(|email| match validation::validate_email_payload(email) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Skipping invalid email payload");
                false
            }
        })
        .collect();

    let now = Utc::now();
    let mut tracker = store.load().await;
    tracker.create_campaign(campaign_id, emails.len(), now);

    let mut horizon = Horizon::new(now, cfg.horizon_days);
    let mut rng = StdRng::from_entropy();

    let scheduled = schedule_optimized(
        &emails,
        senders,
        &mut tracker,
        &mut horizon,
        campaign_id,
        selector,
        &mut rng,
        now,
        cfg,
    )?;

    tracker.campaign_mut(campaign_id)?.status = CampaignStatus::InProgress;
    store.save(&tracker).await?;
    info!(campaign_id, scheduled, total = emails.len(), "Campaign scheduled");

    run_send_loop(&mut tracker, store, transport, records, policy, cfg).await?;

    // Advisory status: the loop stops once nothing is due, which may leave
    // future-dated items still pending.
    let campaign = tracker.campaign_mut(campaign_id)?;
    let drained = campaign.emails_sent + campaign.emails_failed >= campaign.emails_scheduled;
    campaign.status = if !drained {
        CampaignStatus::InProgress
    } else if campaign.emails_sent == 0 && campaign.emails_failed > 0 {
        CampaignStatus::Failed
    } else {
        CampaignStatus::Completed
    };
    store.save(&tracker).await?;
    info!(
        campaign_id,
        sent = tracker.campaigns[campaign_id].emails_sent,
        failed = tracker.campaigns[campaign_id].emails_failed,
        "Campaign processing finished"
    );

    Ok(())
}
