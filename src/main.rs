use outreach::campaign::run_campaign;
use outreach::config::{SchedulerConfig, SendPolicy, SenderConfig};
use outreach::distributor::policy::Randomized;
use outreach::model::EmailPayload;
use outreach::store::{JsonFileStore, JsonlRecordStore};
use outreach::transport::SmtpMailTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let campaign_file = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: outreach <campaign.json>");
        eprintln!("  campaign.json: array of email payloads");
        std::process::exit(1);
    });

    let senders = SenderConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export SENDER_COUNT=1 SENDER_IDENTITY_1=you@example.com ...");
        std::process::exit(1);
    });

    let tracker_path = std::env::var("OUTREACH_TRACKER_PATH")
        .unwrap_or_else(|_| "./data/sending_tracker.json".to_string());
    let records_path = std::env::var("OUTREACH_OUTBOUND_LOG")
        .unwrap_or_else(|_| "./data/outbound_log.jsonl".to_string());

    eprintln!("📬 Outreach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Senders: {}", senders.len());
    eprintln!("   Tracker: {tracker_path}");
    eprintln!("   Outbound log: {records_path}");

    let raw = tokio::fs::read_to_string(&campaign_file).await?;
    let emails: Vec<EmailPayload> = serde_json::from_str(&raw)?;
    eprintln!("   Campaign: {} emails from {campaign_file}", emails.len());

    let transport = SmtpMailTransport::from_env(&senders).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let store = JsonFileStore::new(&tracker_path);
    let records = JsonlRecordStore::new(&records_path);
    let mut selector = Randomized::new();

    let campaign_id = uuid::Uuid::new_v4().to_string();
    run_campaign(
        &campaign_id,
        emails,
        &senders,
        &store,
        &transport,
        &records,
        &mut selector,
        &SendPolicy::default(),
        &SchedulerConfig::default(),
    )
    .await?;

    Ok(())
}
