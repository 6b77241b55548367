//! Batch writer — stages processed rows and commits them in one write.
//!
//! Only the four scheduling columns are ever addressed; identity columns
//! belong to the upstream process and are never touched. One batched write
//! per poll cycle bounds API calls, and a failed write simply leaves the
//! store unchanged — the next cycle re-derives the same due set.

use herald_core::error::Result;
use herald_core::traits::SheetStore;
use herald_core::types::RangeUpdate;

use crate::record::Record;
use crate::schema::StateRange;
use crate::status::iso_ts;

/// Build the single-row update covering a processed record's state cells.
pub fn stage_update(state_range: &StateRange, record: &Record) -> RangeUpdate {
    let type_cell = record
        .next_email_type
        .map(|t| t.as_str().to_string())
        .unwrap_or_default();
    let at_cell = record.next_email_at.map(iso_ts).unwrap_or_default();
    RangeUpdate {
        range: state_range.row_range(record.row),
        values: vec![vec![
            type_cell,
            at_cell,
            record.email_status.clone(),
            record.overall_status.clone(),
        ]],
    }
}

/// Commit all staged updates in one batched write. A no-op for an empty
/// batch.
pub async fn commit(sheets: &dyn SheetStore, updates: Vec<RangeUpdate>) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }
    let count = updates.len();
    sheets.batch_update(updates).await?;
    tracing::info!("💾 Committed {count} row update(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EmailType, Identity};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_stage_update_addresses_state_columns_only() {
        let state_range = StateRange::parse("Sheet1!Q:T").unwrap();
        let record = Record {
            row: 7,
            identity: Identity::default(),
            next_email_type: Some(EmailType::ComplianceReminder),
            next_email_at: Some(Utc.with_ymd_and_hms(2024, 1, 4, 0, 5, 0).unwrap()),
            email_status: "welcome|2024-01-01T00:00:00Z|sent|2024-01-01T00:05:00Z|1".into(),
            overall_status: "welcome -> sent at 2024-01-01 00:05 UTC".into(),
        };

        let update = stage_update(&state_range, &record);
        assert_eq!(update.range, "Sheet1!Q7:T7");
        assert_eq!(update.values.len(), 1);
        assert_eq!(
            update.values[0],
            vec![
                "compliance_reminder".to_string(),
                "2024-01-04T00:05:00Z".to_string(),
                record.email_status.clone(),
                record.overall_status.clone(),
            ]
        );
    }

    #[test]
    fn test_stage_update_terminal_row_clears_timestamp() {
        let state_range = StateRange::parse("Q:T").unwrap();
        let record = Record {
            row: 3,
            identity: Identity::default(),
            next_email_type: Some(EmailType::Complete),
            next_email_at: None,
            email_status: String::new(),
            overall_status: String::new(),
        };
        let update = stage_update(&state_range, &record);
        assert_eq!(update.range, "Q3:T3");
        assert_eq!(update.values[0][0], "complete");
        assert_eq!(update.values[0][1], "");
    }
}
