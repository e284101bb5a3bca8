//! Input validation for email payloads, sender configs, and sending rules.

use chrono_tz::Tz;

use crate::config::{SenderConfig, SendingRules};
use crate::error::ValidationError;
use crate::model::EmailPayload;

/// Validate one email payload before it enters scheduling.
pub fn validate_email_payload(payload: &EmailPayload) -> Result<(), ValidationError> {
    if payload.recipients.is_empty() || payload.recipients.iter().any(String::is_empty) {
        return Err(ValidationError::MissingField("email_recipient".into()));
    }
    if payload.subject.is_empty() {
        return Err(ValidationError::MissingField("subjectline".into()));
    }
    if payload.body.is_empty() {
        return Err(ValidationError::MissingField("email_content".into()));
    }
    if payload.timezone.parse::<Tz>().is_err() {
        return Err(ValidationError::InvalidTimezone(payload.timezone.clone()));
    }
    Ok(())
}

/// Validate one sender configuration.
pub fn validate_sender_config(config: &SenderConfig) -> Result<(), ValidationError> {
    if config.identity.is_empty() {
        return Err(ValidationError::MissingField("identity".into()));
    }
    if config.daily_limit == 0 {
        return Err(ValidationError::InvalidDailyLimit(config.daily_limit));
    }
    Ok(())
}

/// Validate a sending rules set.
pub fn validate_sending_rules(rules: &SendingRules) -> Result<(), ValidationError> {
    if rules.allowed_hour_start >= rules.allowed_hour_end {
        return Err(ValidationError::InvalidRules(
            "allowed_hour_start must be before allowed_hour_end".into(),
        ));
    }
    if rules.allowed_hour_end > 24 {
        return Err(ValidationError::InvalidRules(
            "allowed_hour_end must be at most 24".into(),
        ));
    }
    if rules.min_gap <= chrono::Duration::zero() {
        return Err(ValidationError::InvalidRules("min_gap must be positive".into()));
    }
    if rules.excluded_weekdays.len() >= 7 {
        return Err(ValidationError::InvalidRules(
            "at least one weekday must be allowed".into(),
        ));
    }
    Ok(())
}
