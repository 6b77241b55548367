//! Tracker records — the engine's in-memory data model.
//!
//! Two parallel cell grids (identity and state, aligned by physical row)
//! become one `Record` per row. Parsing is deliberately lenient: a missing
//! cell is an empty string and a malformed timestamp is "unset" — a single
//! bad row must never abort a poll cycle.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use herald_core::types::Grid;

use crate::schema::{COL_EMAIL, COL_LOCATION, COL_NAME, COL_TIMEZONE, COL_WORKORDER_ID};
use crate::status::{SendOutcome, StatusToken};

/// The lifecycle stage a row is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Welcome,
    ComplianceReminder,
    PasswordSetupReminder,
    HardwareFollowup,
    /// Terminal — no further action is ever scheduled.
    Complete,
}

impl EmailType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "welcome" => Some(Self::Welcome),
            "compliance_reminder" => Some(Self::ComplianceReminder),
            "password_setup_reminder" => Some(Self::PasswordSetupReminder),
            "hardware_followup" => Some(Self::HardwareFollowup),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::ComplianceReminder => "compliance_reminder",
            Self::PasswordSetupReminder => "password_setup_reminder",
            Self::HardwareFollowup => "hardware_followup",
            Self::Complete => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity fields owned by the upstream HR process. Read-only here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub workorder_id: String,
    pub location: String,
    pub timezone: String,
}

/// One row of the tracker: one onboarding candidate.
#[derive(Debug, Clone)]
pub struct Record {
    /// 1-based sheet row number — the only key a record has.
    pub row: usize,
    pub identity: Identity,
    pub next_email_type: Option<EmailType>,
    pub next_email_at: Option<DateTime<Utc>>,
    /// Raw email-status cell (machine token).
    pub email_status: String,
    /// Raw overall-status cell (human summary).
    pub overall_status: String,
}

impl Record {
    /// True iff this row needs action now: known non-terminal type, elapsed
    /// timestamp, and no `sent` token for that exact (type, planned_at)
    /// pair. Pure function of the record and `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(email_type) = self.next_email_type else {
            return false;
        };
        if email_type.is_terminal() {
            return false;
        }
        let Some(next_at) = self.next_email_at else {
            return false;
        };
        if next_at > now {
            return false;
        }
        !self.already_processed()
    }

    /// Whether the status cell already records a successful send for the
    /// row's current (type, planned_at) pair.
    pub fn already_processed(&self) -> bool {
        let (Some(email_type), Some(next_at)) = (self.next_email_type, self.next_email_at) else {
            return false;
        };
        match StatusToken::parse(&self.email_status) {
            Some(token) => {
                token.outcome == SendOutcome::Sent
                    && token.email_type == email_type
                    && token.planned_at == next_at
            }
            None => false,
        }
    }
}

/// Parse a timestamp cell. Accepts RFC 3339 / `YYYY-MM-DDTHH:MM:SSZ` and
/// the legacy `YYYY-MM-DD HH:MM:SS[ UTC]` forms; anything else is None.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S UTC", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Build records from the two fetched grids. Both grids carry a header row
/// at index 0; row *i* of one range corresponds to row *i* of the other.
pub fn parse_records(identity_values: &Grid, state_values: &Grid) -> Vec<Record> {
    let max_len = identity_values.len().max(state_values.len());
    let mut records = Vec::new();

    for i in 1..max_len {
        let empty: Vec<String> = Vec::new();
        let ident = identity_values.get(i).unwrap_or(&empty);
        let state = state_values.get(i).unwrap_or(&empty);
        let row = i + 1; // 1-based sheet row

        let identity = Identity {
            name: cell(ident, COL_NAME),
            email: cell(ident, COL_EMAIL),
            workorder_id: cell(ident, COL_WORKORDER_ID),
            location: cell(ident, COL_LOCATION),
            timezone: cell(ident, COL_TIMEZONE),
        };

        let type_cell = cell(state, 1);
        let next_email_type = if type_cell.is_empty() {
            None
        } else {
            let parsed = EmailType::parse(&type_cell);
            if parsed.is_none() {
                tracing::warn!("⚠️ Row {row}: unknown email type '{type_cell}', skipping");
            }
            parsed
        };

        let at_cell = cell(state, 2);
        let next_email_at = if at_cell.is_empty() {
            None
        } else {
            let parsed = parse_timestamp(&at_cell);
            if parsed.is_none() {
                tracing::warn!("⚠️ Row {row}: unparseable timestamp '{at_cell}', treating as unset");
            }
            parsed
        };

        records.push(Record {
            row,
            identity,
            next_email_type,
            next_email_at,
            email_status: cell(state, 3),
            overall_status: cell(state, 4),
        });
    }

    records
}

/// Fetch a 1-based cell from a (possibly ragged) row, trimmed.
fn cell(row: &[String], col: usize) -> String {
    row.get(col - 1).map(|v| v.trim().to_string()).unwrap_or_default()
}
