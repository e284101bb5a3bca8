//! SMTP shim over lettre — the one concrete `MailTransport`.
//!
//! Deliberately thin: credential handling, message building, and a blocking
//! send moved off the async runtime. Everything interesting happens in the
//! scheduling core.

use std::collections::HashMap;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;
use uuid::Uuid;

use crate::config::SenderConfig;
use crate::error::{ConfigError, TransportError};
use crate::transport::{MailTransport, ProviderHeaders, clean_subject, generate_conversation_id};

/// SMTP relay endpoint shared by all identities.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
}

impl SmtpConfig {
    /// Build from `SMTP_HOST` (required) and `SMTP_PORT` (default 587).
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| ConfigError::MissingEnvVar("SMTP_HOST".into()))?;
        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(587);
        Ok(Self { host, port })
    }
}

/// Per-identity SMTP login.
#[derive(Debug, Clone)]
struct Login {
    username: String,
    password: String,
}

/// Sends through an SMTP relay, one login per sending identity.
pub struct SmtpMailTransport {
    config: SmtpConfig,
    logins: HashMap<String, Login>,
}

impl SmtpMailTransport {
    pub fn new(
        config: SmtpConfig,
        credentials: impl IntoIterator<Item = (String, String, String)>,
    ) -> Self {
        let logins = credentials
            .into_iter()
            .map(|(identity, username, password)| (identity, Login { username, password }))
            .collect();
        Self { config, logins }
    }

    /// Build from the environment: `SENDER_SMTP_USERNAME_{i}` (defaults to
    /// the identity itself) and `SENDER_SMTP_PASSWORD_{i}` (required), with
    /// `i` matching the sender's 1-based position in `senders`.
    pub fn from_env(senders: &[SenderConfig]) -> Result<Self, ConfigError> {
        let config = SmtpConfig::from_env()?;
        let mut credentials = Vec::with_capacity(senders.len());
        for (i, sender) in senders.iter().enumerate() {
            let n = i + 1;
            let username = std::env::var(format!("SENDER_SMTP_USERNAME_{n}"))
                .unwrap_or_else(|_| sender.identity.clone());
            let password_key = format!("SENDER_SMTP_PASSWORD_{n}");
            let password = std::env::var(&password_key)
                .map_err(|_| ConfigError::MissingEnvVar(password_key))?;
            credentials.push((sender.identity.clone(), username, password));
        }
        Ok(Self::new(config, credentials))
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(
        &self,
        identity: &str,
        recipient: &str,
        subject: &str,
        body: &str,
        _timezone: &str,
        _headers: &HashMap<String, String>,
    ) -> Result<ProviderHeaders, TransportError> {
        let login = self.logins.get(identity).ok_or_else(|| TransportError::SendFailed {
            identity: identity.to_string(),
            reason: "no SMTP credentials for identity".to_string(),
        })?;

        let host = self.config.host.clone();
        let port = self.config.port;
        let creds = Credentials::new(login.username.clone(), login.password.clone());
        let from = identity.to_string();
        let to = recipient.to_string();
        let subject = clean_subject(subject);
        let body = body.to_string();

        let send_identity = from.clone();
        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::relay(&host)
                .map_err(|e| TransportError::SendFailed {
                    identity: send_identity.clone(),
                    reason: format!("SMTP relay error: {e}"),
                })?
                .port(port)
                .credentials(creds)
                .build();

            let email = Message::builder()
                .from(from.parse().map_err(|e| TransportError::InvalidAddress {
                    address: from.clone(),
                    reason: format!("{e}"),
                })?)
                .to(to.parse().map_err(|e| TransportError::InvalidAddress {
                    address: to.clone(),
                    reason: format!("{e}"),
                })?)
                .subject(&subject)
                .body(body)
                .map_err(|e| TransportError::SendFailed {
                    identity: send_identity.clone(),
                    reason: format!("Failed to build email: {e}"),
                })?;

            transport.send(&email).map_err(|e| TransportError::SendFailed {
                identity: send_identity.clone(),
                reason: format!("SMTP send failed: {e}"),
            })
        })
        .await
        .map_err(|e| TransportError::SendFailed {
            identity: identity.to_string(),
            reason: format!("send task panicked: {e}"),
        })??;

        info!(identity, recipient, "Email sent");

        Ok(ProviderHeaders {
            message_id: Some(Uuid::new_v4().to_string()),
            conversation_id: Some(generate_conversation_id()),
            thread_id: None,
        })
    }
}
