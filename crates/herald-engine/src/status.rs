//! Status cell encoding — the idempotency token and the human summary.
//!
//! The machine token is the only thing standing between a repeated poll and
//! a duplicate email, so its textual form must be stable and round-trippable:
//! `type|planned_at|outcome|sent_at|attempts[|detail]`. All in-memory logic
//! works on the typed forms below; the delimited string exists only at the
//! persistence boundary.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::record::{EmailType, parse_timestamp};

/// Detail text is truncated to keep the status cell bounded.
pub const DETAIL_MAX_LEN: usize = 200;

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Delivered (or accepted by the transport).
    Sent,
    /// Sending disabled; nothing left the building.
    DryRun,
    /// Transport or template failure, with a short reason.
    Error(String),
    /// Hard local failure — no transport attempt was made.
    Failed,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }

    fn encode(&self) -> String {
        match self {
            SendOutcome::Sent => "sent".to_string(),
            SendOutcome::DryRun => "dry_run".to_string(),
            SendOutcome::Error(msg) => format!("error:{}", sanitize_detail(msg)),
            SendOutcome::Failed => "failed".to_string(),
        }
    }

    fn decode(raw: &str) -> Option<Self> {
        match raw {
            "sent" => Some(SendOutcome::Sent),
            "dry_run" => Some(SendOutcome::DryRun),
            "failed" => Some(SendOutcome::Failed),
            _ => raw
                .strip_prefix("error:")
                .map(|msg| SendOutcome::Error(msg.to_string())),
        }
    }

    /// Short word for human-facing summaries.
    pub fn label(&self) -> &'static str {
        match self {
            SendOutcome::Sent => "sent",
            SendOutcome::DryRun => "dry_run",
            SendOutcome::Error(_) => "error",
            SendOutcome::Failed => "failed",
        }
    }
}

/// Canonical timestamp form used inside tokens. The selector reconstructs
/// tokens with this exact function, so formatting can never drift between
/// writer and reader.
pub fn iso_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The parsed form of the email-status cell.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusToken {
    pub email_type: EmailType,
    pub planned_at: DateTime<Utc>,
    pub outcome: SendOutcome,
    pub sent_at: DateTime<Utc>,
    pub attempts: u32,
    pub detail: Option<String>,
}

impl StatusToken {
    /// Serialize to the stable cell form.
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{}|{}|{}|{}|{}",
            self.email_type.as_str(),
            iso_ts(self.planned_at),
            self.outcome.encode(),
            iso_ts(self.sent_at),
            self.attempts
        );
        if let Some(detail) = &self.detail {
            let detail = sanitize_detail(detail);
            if !detail.is_empty() {
                out.push('|');
                out.push_str(&detail);
            }
        }
        out
    }

    /// Parse a cell back into the typed form. Unknown or truncated cells
    /// yield `None` — an unreadable token never blocks a row.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut parts = raw.splitn(6, '|');
        let email_type = EmailType::parse(parts.next()?)?;
        let planned_at = parse_timestamp(parts.next()?)?;
        let outcome = SendOutcome::decode(parts.next()?)?;
        let sent_at = parse_timestamp(parts.next()?)?;
        let attempts = parts.next()?.trim().parse().ok()?;
        let detail = parts.next().map(|d| d.to_string());
        Some(Self {
            email_type,
            planned_at,
            outcome,
            sent_at,
            attempts,
            detail,
        })
    }
}

/// Attempt count for a new token: consecutive tries of the same stage count
/// up (the planned time moves with each retry backoff, so the stage is the
/// stable thing to count); a stage change or a prior success resets to a
/// first attempt. A prior dry-run token carries attempts 0, so the first
/// real send after a dry run still reads as attempt 1.
pub fn next_attempts(previous_cell: &str, email_type: EmailType) -> u32 {
    match StatusToken::parse(previous_cell) {
        Some(prev) if prev.email_type == email_type && !prev.outcome.is_success() => {
            prev.attempts + 1
        }
        _ => 1,
    }
}

/// Keep details single-field and bounded: the delimiter is reserved and the
/// cell must not grow without limit.
pub fn sanitize_detail(detail: &str) -> String {
    detail
        .replace('|', "/")
        .replace('\n', " ")
        .chars()
        .take(DETAIL_MAX_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Human-readable overall status for the fourth state column. Derived, not
/// authoritative.
pub fn build_overall_status(
    acted_type: EmailType,
    outcome: &SendOutcome,
    at: DateTime<Utc>,
    next_type: Option<EmailType>,
    next_at: Option<DateTime<Utc>>,
) -> String {
    let mut out = format!(
        "{} -> {} at {}",
        acted_type.as_str(),
        outcome.label(),
        at.format("%Y-%m-%d %H:%M UTC")
    );
    match (next_type, next_at) {
        (Some(EmailType::Complete), _) | (Some(_), None) => out.push_str("; complete"),
        (Some(next), Some(when)) => {
            out.push_str(&format!("; next {} at {}", next.as_str(), iso_ts(when)));
        }
        (None, _) => {}
    }
    out
}
