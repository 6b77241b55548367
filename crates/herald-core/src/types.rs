//! Common data types shared across Herald crates.

use serde::{Deserialize, Serialize};

/// A rectangular block of spreadsheet cells, rows of string values.
/// Rows may be ragged — trailing empty cells are omitted by the store.
pub type Grid = Vec<Vec<String>>;

/// One staged write against the spreadsheet store: an A1 range plus the
/// replacement values for exactly that range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeUpdate {
    pub range: String,
    pub values: Vec<Vec<String>>,
}

/// An outbound email handed to the mail transport.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<Attachment>,
}

impl OutgoingEmail {
    pub fn new(to: &str, subject: &str, html_body: String) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body,
            attachment: None,
        }
    }
}

/// A file attached to an outbound email.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}
