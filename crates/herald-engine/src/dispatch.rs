//! Email dispatch — maps a due record to the right template and transport
//! call, and classifies the outcome.
//!
//! The dispatcher never lets an error escape: a missing recipient, a
//! template miss, or a transport failure all come back as a `SendOutcome`,
//! so one row's total failure can never abort the surrounding batch.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use herald_core::config::ScheduleConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::{MailTransport, TemplateStore};
use herald_core::types::OutgoingEmail;

use crate::record::{EmailType, Record};
use crate::status::SendOutcome;

/// Outcome of one dispatch, plus optional detail for the status token
/// (delivery id on success, reason on a hard local failure).
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub outcome: SendOutcome,
    pub detail: Option<String>,
}

/// Sends the email matching a record's pending stage.
pub struct Dispatcher {
    mailer: Arc<dyn MailTransport>,
    templates: Arc<dyn TemplateStore>,
    /// Compliance deadline shown in reminder mails, from send time.
    compliance_deadline: Duration,
    /// Password-setup appointment lead shown in reminder mails.
    appointment_lead: Duration,
}

impl Dispatcher {
    pub fn new(
        mailer: Arc<dyn MailTransport>,
        templates: Arc<dyn TemplateStore>,
        config: &ScheduleConfig,
    ) -> Self {
        Self {
            mailer,
            templates,
            compliance_deadline: Duration::days(config.compliance_deadline_days),
            appointment_lead: Duration::hours(config.appointment_lead_hours),
        }
    }

    /// Send the email for `email_type` to this record's candidate.
    pub async fn dispatch(
        &self,
        record: &Record,
        email_type: EmailType,
        now: DateTime<Utc>,
    ) -> DispatchResult {
        if record.identity.email.is_empty() {
            tracing::warn!(
                "⚠️ Row {}: no recipient address, nothing sent",
                record.row
            );
            return DispatchResult {
                outcome: SendOutcome::Failed,
                detail: Some("missing recipient address".into()),
            };
        }

        let email = match self.render(record, email_type, now).await {
            Ok(email) => email,
            Err(e) => {
                tracing::warn!("⚠️ Row {}: template failure: {e}", record.row);
                return DispatchResult {
                    outcome: SendOutcome::Error(e.to_string()),
                    detail: None,
                };
            }
        };

        match self.mailer.send(&email).await {
            Ok(delivery_id) => {
                tracing::info!(
                    "📤 Row {}: {} sent to {} ({delivery_id})",
                    record.row,
                    email_type,
                    record.identity.email
                );
                DispatchResult {
                    outcome: SendOutcome::Sent,
                    detail: Some(delivery_id),
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Row {}: send failed: {e}", record.row);
                DispatchResult {
                    outcome: SendOutcome::Error(e.to_string()),
                    detail: None,
                }
            }
        }
    }

    /// Load the stage's template and substitute the named placeholders.
    async fn render(
        &self,
        record: &Record,
        email_type: EmailType,
        now: DateTime<Utc>,
    ) -> Result<OutgoingEmail> {
        let raw = self
            .template_for(email_type, &record.identity.location)
            .await?;

        let mut html = raw
            .replace("{Candidate_Name}", &record.identity.name)
            .replace("{Location}", &record.identity.location);

        match email_type {
            EmailType::ComplianceReminder => {
                let deadline = (now + self.compliance_deadline).format("%d-%b-%Y");
                html = html.replace("{Deadline_Date}", &deadline.to_string());
            }
            EmailType::PasswordSetupReminder => {
                let appointment = (now + self.appointment_lead).format("%d-%b-%Y %I:%M %p");
                html = html
                    .replace("{Worker_ID}", &record.identity.workorder_id)
                    .replace("{Appointment_Time}", &appointment.to_string());
            }
            _ => {}
        }

        Ok(OutgoingEmail::new(
            &record.identity.email,
            subject(email_type),
            html,
        ))
    }

    /// Fetch the first available template candidate for a stage. The
    /// welcome mail prefers a location-specific template when one exists.
    async fn template_for(&self, email_type: EmailType, location: &str) -> Result<String> {
        let mut last_err = HeraldError::Template(format!("no template for {email_type}"));
        for name in template_candidates(email_type, location) {
            match self.templates.lookup(&name).await {
                Ok(html) => return Ok(html),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

/// Subject line per stage.
pub fn subject(email_type: EmailType) -> &'static str {
    match email_type {
        EmailType::Welcome => "Account Onboarding | Hardware Collection Required",
        EmailType::ComplianceReminder => "Action Required: Sign Your Compliance Documents",
        EmailType::PasswordSetupReminder => "Reminder: Password Setup Session Starting in 1 Hour",
        EmailType::HardwareFollowup => "Hardware Setup: Next Steps",
        EmailType::Complete => "Onboarding Complete",
    }
}

/// Template lookup order for a stage, most specific first.
fn template_candidates(email_type: EmailType, location: &str) -> Vec<String> {
    match email_type {
        EmailType::Welcome => {
            let slug = location_slug(location);
            if slug.is_empty() {
                vec!["welcome.html".into()]
            } else {
                vec![format!("welcome_{slug}.html"), "welcome.html".into()]
            }
        }
        EmailType::ComplianceReminder => vec!["compliance_reminder.html".into()],
        EmailType::PasswordSetupReminder => vec!["password_setup_reminder.html".into()],
        EmailType::HardwareFollowup => vec!["hardware_followup.html".into()],
        EmailType::Complete => vec!["onboarding_complete.html".into()],
    }
}

fn location_slug(location: &str) -> String {
    location
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
