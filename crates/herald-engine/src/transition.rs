//! The transition function — a deterministic finite-state machine over the
//! email lifecycle.
//!
//! States are the email types plus the terminal `complete`. A transition
//! fires only through a dispatch outcome: success advances along the static
//! table, failure retries the same stage after a fixed backoff. The backoff
//! is 30 minutes by default (the canonical policy; see DESIGN.md).

use chrono::{DateTime, Duration, Utc};

use herald_core::config::ScheduleConfig;

use crate::record::EmailType;

/// Delays governing stage advancement and failure retry.
#[derive(Debug, Clone)]
pub struct TransitionPolicy {
    /// welcome -> compliance_reminder
    pub compliance_delay: Duration,
    /// compliance_reminder -> password_setup_reminder
    pub password_setup_delay: Duration,
    /// password_setup_reminder -> hardware_followup
    pub hardware_delay: Duration,
    /// Retry-in-place backoff after a failed send.
    pub retry_backoff: Duration,
}

impl TransitionPolicy {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            compliance_delay: Duration::hours(config.compliance_delay_hours),
            password_setup_delay: Duration::hours(config.password_setup_delay_hours),
            hardware_delay: Duration::hours(config.hardware_delay_hours),
            retry_backoff: Duration::minutes(config.retry_backoff_minutes),
        }
    }

    /// Compute the next (type, timestamp) for a row after a dispatch.
    ///
    /// Success walks the static table; a terminal or table-less type lands
    /// on `(Complete, None)`. Failure keeps the current type and pushes the
    /// timestamp forward by the backoff — never backward, never a stage
    /// skip.
    pub fn next(
        &self,
        current: EmailType,
        now: DateTime<Utc>,
        success: bool,
    ) -> (EmailType, Option<DateTime<Utc>>) {
        if !success {
            return (current, Some(now + self.retry_backoff));
        }
        match current {
            EmailType::Welcome => (
                EmailType::ComplianceReminder,
                Some(now + self.compliance_delay),
            ),
            EmailType::ComplianceReminder => (
                EmailType::PasswordSetupReminder,
                Some(now + self.password_setup_delay),
            ),
            EmailType::PasswordSetupReminder => (
                EmailType::HardwareFollowup,
                Some(now + self.hardware_delay),
            ),
            EmailType::HardwareFollowup | EmailType::Complete => (EmailType::Complete, None),
        }
    }
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::from_config(&ScheduleConfig::default())
    }
}
