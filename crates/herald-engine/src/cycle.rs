//! Poll-cycle orchestrator — one FETCH -> PROCESS -> COMMIT pass.
//!
//! Each invocation reads both tracker ranges, processes due rows
//! independently in spreadsheet row order, and commits every staged row
//! state in a single batched write. When sending is disabled the cycle runs
//! as a dry run: due rows are marked `dry_run` in memory and in the summary
//! but the state machine does not advance and the commit is skipped
//! entirely, so a later real cycle re-finds the same due set. That is a
//! deliberate contract, not an oversight — a dry run must never consume a
//! real transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use herald_core::config::HeraldConfig;
use herald_core::error::Result;
use herald_core::traits::{MailTransport, SheetStore, TemplateStore};

use crate::dispatch::Dispatcher;
use crate::record;
use crate::schema::StateRange;
use crate::status::{SendOutcome, StatusToken, build_overall_status, iso_ts, next_attempts};
use crate::transition::TransitionPolicy;
use crate::writer;

/// Per-row result echoed in the cycle summary.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    pub row: usize,
    pub email_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Structured summary of one poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub timestamp: String,
    pub checked: usize,
    pub due: usize,
    pub updated: usize,
    pub dry_run: bool,
    pub successes: Vec<RowOutcome>,
    pub failures: Vec<RowOutcome>,
}

/// The scheduling engine: owns the boundary clients and runs poll cycles.
pub struct PollEngine {
    identity_range: String,
    state_range_raw: String,
    state_range: StateRange,
    policy: TransitionPolicy,
    sheets: Arc<dyn SheetStore>,
    dispatcher: Dispatcher,
}

impl PollEngine {
    pub fn new(
        config: &HeraldConfig,
        sheets: Arc<dyn SheetStore>,
        mailer: Arc<dyn MailTransport>,
        templates: Arc<dyn TemplateStore>,
    ) -> Result<Self> {
        let state_range = StateRange::parse(&config.tracker.state_range)?;
        Ok(Self {
            identity_range: config.tracker.identity_range.clone(),
            state_range_raw: config.tracker.state_range.clone(),
            state_range,
            policy: TransitionPolicy::from_config(&config.schedule),
            dispatcher: Dispatcher::new(mailer, templates, &config.schedule),
            sheets,
        })
    }

    /// Run one full poll cycle. A read or write failure against the store
    /// is fatal to the cycle (nothing was committed); everything else is
    /// absorbed into per-row outcomes.
    pub async fn run_cycle(
        &self,
        now: DateTime<Utc>,
        sending_enabled: bool,
    ) -> Result<CycleSummary> {
        // FETCH
        let (identity, state) = self
            .sheets
            .fetch_ranges(&self.identity_range, &self.state_range_raw)
            .await?;
        let mut records = record::parse_records(&identity, &state);
        let checked = records.len();

        let due_indices: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_due(now))
            .map(|(i, _)| i)
            .collect();
        let due = due_indices.len();
        if due > 0 {
            tracing::info!("📋 {due} of {checked} row(s) due");
        }

        // PROCESS — rows are independent; one failure never stops the rest.
        let mut updates = Vec::new();
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        for i in due_indices {
            let record = &mut records[i];
            let (Some(email_type), Some(planned_at)) =
                (record.next_email_type, record.next_email_at)
            else {
                continue; // is_due guarantees both; keep the loop total anyway
            };

            if !sending_enabled {
                let token = StatusToken {
                    email_type,
                    planned_at,
                    outcome: SendOutcome::DryRun,
                    sent_at: now,
                    attempts: 0,
                    detail: None,
                };
                record.email_status = token.encode();
                record.overall_status = build_overall_status(
                    email_type,
                    &SendOutcome::DryRun,
                    now,
                    record.next_email_type,
                    record.next_email_at,
                );
                updates.push(writer::stage_update(&self.state_range, record));
                successes.push(RowOutcome {
                    row: record.row,
                    email_type: email_type.to_string(),
                    detail: Some("dry_run".into()),
                });
                continue;
            }

            let result = self.dispatcher.dispatch(record, email_type, now).await;
            let success = result.outcome.is_success();
            let attempts = next_attempts(&record.email_status, email_type);
            let (next_type, next_at) = self.policy.next(email_type, now, success);

            let token = StatusToken {
                email_type,
                planned_at,
                outcome: result.outcome.clone(),
                sent_at: now,
                attempts,
                detail: result.detail.clone(),
            };
            record.email_status = token.encode();
            record.next_email_type = Some(next_type);
            record.next_email_at = next_at;
            record.overall_status = build_overall_status(
                email_type,
                &result.outcome,
                now,
                record.next_email_type,
                record.next_email_at,
            );
            updates.push(writer::stage_update(&self.state_range, record));

            let detail = match &result.outcome {
                SendOutcome::Error(msg) => Some(msg.clone()),
                _ => result.detail,
            };
            let outcome = RowOutcome {
                row: record.row,
                email_type: email_type.to_string(),
                detail,
            };
            if success {
                successes.push(outcome);
            } else {
                failures.push(outcome);
            }
        }

        let updated = updates.len();

        // COMMIT
        if sending_enabled {
            writer::commit(self.sheets.as_ref(), updates).await?;
        } else if updated > 0 {
            tracing::info!("📴 Dry run — skipping batch write for {updated} row(s)");
        }

        tracing::info!(
            "✅ Poll cycle done: checked={checked} due={due} updated={updated} failed={}",
            failures.len()
        );
        Ok(CycleSummary {
            timestamp: iso_ts(now),
            checked,
            due,
            updated,
            dry_run: !sending_enabled,
            successes,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use herald_core::error::HeraldError;
    use herald_core::types::{Grid, OutgoingEmail, RangeUpdate};
    use std::sync::Mutex;

    use crate::record::EmailType;

    // ─── In-memory fakes ──────────────────────────────────────

    struct MemorySheet {
        identity: Grid,
        state: Mutex<Grid>,
        fail_fetch: bool,
        fail_write: bool,
    }

    impl MemorySheet {
        fn new(identity: Grid, state: Grid) -> Arc<Self> {
            Arc::new(Self {
                identity,
                state: Mutex::new(state),
                fail_fetch: false,
                fail_write: false,
            })
        }

        fn state_row(&self, row: usize) -> Vec<String> {
            self.state.lock().unwrap()[row - 1].clone()
        }
    }

    /// Pull the 1-based row number out of a staged range like "Sheet1!Q5:T5".
    fn range_row(range: &str) -> usize {
        let cols = range.rsplit('!').next().unwrap();
        let first = cols.split(':').next().unwrap();
        first
            .chars()
            .skip_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .parse()
            .unwrap()
    }

    #[async_trait]
    impl SheetStore for MemorySheet {
        async fn fetch_ranges(&self, _identity: &str, _state: &str) -> Result<(Grid, Grid)> {
            if self.fail_fetch {
                return Err(HeraldError::Sheets("batchGet: 503".into()));
            }
            Ok((self.identity.clone(), self.state.lock().unwrap().clone()))
        }

        async fn batch_update(&self, updates: Vec<RangeUpdate>) -> Result<()> {
            if self.fail_write {
                return Err(HeraldError::Sheets("batchUpdate: 503".into()));
            }
            let mut state = self.state.lock().unwrap();
            for update in updates {
                let row = range_row(&update.range);
                while state.len() < row {
                    state.push(vec![String::new(); 4]);
                }
                state[row - 1] = update.values[0].clone();
            }
            Ok(())
        }
    }

    struct CountingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl CountingMailer {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            })
        }
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            })
        }
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MailTransport for CountingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<String> {
            if self.fail {
                return Err(HeraldError::Transport("connection reset by peer".into()));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((email.to.clone(), email.subject.clone()));
            Ok(format!("msg-{}", sent.len()))
        }
    }

    struct StaticTemplates;

    #[async_trait]
    impl TemplateStore for StaticTemplates {
        async fn lookup(&self, _name: &str) -> Result<String> {
            Ok("<p>Hi {Candidate_Name}</p>".into())
        }
    }

    // ─── Fixtures ──────────────────────────────────────

    fn grid(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn identity_grid() -> Grid {
        grid(&[
            &["Name", "Email", "Workorder", "Location", "Timezone"],
            &["Asha Rao", "asha@example.com", "WO-17", "Pune", "UTC"],
        ])
    }

    fn state_grid(email_type: &str, at: &str, status: &str) -> Grid {
        grid(&[
            &["Next Type", "Next At", "Status", "Overall"],
            &[email_type, at, status, ""],
        ])
    }

    fn config() -> HeraldConfig {
        let mut config = HeraldConfig::default();
        config.tracker.state_range = "Sheet1!Q:T".into();
        config
    }

    fn engine(sheet: Arc<MemorySheet>, mailer: Arc<CountingMailer>) -> PollEngine {
        PollEngine::new(&config(), sheet, mailer, Arc::new(StaticTemplates)).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap()
    }

    // ─── Properties ──────────────────────────────────────

    #[tokio::test]
    async fn test_welcome_round_trip() {
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", ""),
        );
        let mailer = CountingMailer::ok();
        let engine = engine(sheet.clone(), mailer.clone());

        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.due, 1);
        assert_eq!(summary.updated, 1);
        assert!(!summary.dry_run);
        assert_eq!(summary.successes.len(), 1);
        assert_eq!(mailer.count(), 1);

        let row = sheet.state_row(2);
        assert_eq!(row[0], "compliance_reminder");
        assert_eq!(row[1], iso_ts(now() + Duration::hours(72)));
        assert!(row[2].starts_with("welcome|2024-01-01T00:00:00Z|sent|2024-01-01T00:05:00Z|1"));
        assert!(row[3].starts_with("welcome -> sent at 2024-01-01 00:05 UTC"));
    }

    #[tokio::test]
    async fn test_second_cycle_sends_nothing_more() {
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", ""),
        );
        let mailer = CountingMailer::ok();
        let engine = engine(sheet.clone(), mailer.clone());

        engine.run_cycle(now(), true).await.unwrap();
        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.due, 0);
        assert_eq!(mailer.count(), 1);
    }

    #[tokio::test]
    async fn test_sent_token_alone_blocks_racing_cycle() {
        // A racing cycle committed the sent token but its transition write
        // was for the same row; the stale (type, at) pair plus the token is
        // exactly what a slow overlapping cycle would re-fetch.
        let token = "welcome|2024-01-01T00:00:00Z|sent|2024-01-01T00:02:00Z|1";
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", token),
        );
        let mailer = CountingMailer::ok();
        let engine = engine(sheet, mailer.clone());

        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.due, 0);
        assert_eq!(summary.updated, 0);
        assert_eq!(mailer.count(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_advance() {
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", ""),
        );
        let mailer = CountingMailer::failing();
        let engine = engine(sheet.clone(), mailer);

        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.due, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.successes.is_empty());

        let row = sheet.state_row(2);
        // Same stage, pushed forward by the 30-minute backoff — never the
        // next stage, never backward.
        assert_eq!(row[0], "welcome");
        assert_eq!(row[1], iso_ts(now() + Duration::minutes(30)));
        assert!(row[2].contains("|error:"));
        assert!(row[2].contains("connection reset"));
    }

    #[tokio::test]
    async fn test_consecutive_failures_count_attempts() {
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", ""),
        );
        let mailer = CountingMailer::failing();
        let engine = engine(sheet.clone(), mailer);

        engine.run_cycle(now(), true).await.unwrap();
        let second_now = now() + Duration::minutes(31);
        engine.run_cycle(second_now, true).await.unwrap();

        let token = StatusToken::parse(&sheet.state_row(2)[2]).unwrap();
        assert_eq!(token.attempts, 2);
        assert_eq!(token.email_type, EmailType::Welcome);
    }

    #[tokio::test]
    async fn test_dry_run_non_consumption() {
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", ""),
        );
        let mailer = CountingMailer::ok();
        let engine = engine(sheet.clone(), mailer.clone());

        let summary = engine.run_cycle(now(), false).await.unwrap();
        assert!(summary.dry_run);
        assert_eq!(summary.due, 1);
        assert_eq!(mailer.count(), 0);
        // Commit skipped entirely — the store still holds the original row.
        let row = sheet.state_row(2);
        assert_eq!(row[0], "welcome");
        assert_eq!(row[1], "2024-01-01T00:00:00Z");
        assert_eq!(row[2], "");

        // The same instant with sending enabled still finds the row due.
        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.due, 1);
        assert_eq!(mailer.count(), 1);
    }

    #[tokio::test]
    async fn test_terminal_rows_never_selected() {
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("complete", "2020-01-01T00:00:00Z", ""),
        );
        let mailer = CountingMailer::ok();
        let engine = engine(sheet, mailer.clone());

        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.due, 0);
        assert_eq!(mailer.count(), 0);
    }

    #[tokio::test]
    async fn test_missing_recipient_retries_in_place() {
        let identity = grid(&[
            &["Name", "Email"],
            &["Asha Rao", ""],
        ]);
        let sheet = MemorySheet::new(identity, state_grid("welcome", "2024-01-01T00:00:00Z", ""));
        let mailer = CountingMailer::ok();
        let engine = engine(sheet.clone(), mailer.clone());

        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(mailer.count(), 0);

        let row = sheet.state_row(2);
        assert_eq!(row[0], "welcome");
        assert_eq!(row[1], iso_ts(now() + Duration::minutes(30)));
        assert!(row[2].contains("|failed|"));
        assert!(row[2].ends_with("missing recipient address"));
    }

    #[tokio::test]
    async fn test_one_bad_row_never_aborts_the_batch() {
        let identity = grid(&[
            &["Name", "Email"],
            &["Asha Rao", "asha@example.com"],
            &["Ben Okafor", "ben@example.com"],
        ]);
        let state = grid(&[
            &["Next Type", "Next At", "Status", "Overall"],
            &["welcome", "not-a-date", "", ""],
            &["welcome", "2024-01-01T00:00:00Z", "", ""],
        ]);
        let sheet = MemorySheet::new(identity, state);
        let mailer = CountingMailer::ok();
        let engine = engine(sheet.clone(), mailer.clone());

        let summary = engine.run_cycle(now(), true).await.unwrap();
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.due, 1);
        assert_eq!(summary.successes[0].row, 3);
        assert_eq!(mailer.count(), 1);
        // The malformed row is untouched
        assert_eq!(sheet.state_row(2)[1], "not-a-date");
    }

    #[tokio::test]
    async fn test_due_rows_process_in_row_order() {
        let identity = grid(&[
            &["Name", "Email"],
            &["Asha Rao", "asha@example.com"],
            &["Ben Okafor", "ben@example.com"],
            &["Chen Wei", "chen@example.com"],
        ]);
        let state = grid(&[
            &["Next Type", "Next At", "Status", "Overall"],
            &["welcome", "2024-01-01T00:00:00Z", "", ""],
            &["compliance_reminder", "2024-01-01T00:01:00Z", "", ""],
            &["welcome", "2023-12-31T00:00:00Z", "", ""],
        ]);
        let sheet = MemorySheet::new(identity, state);
        let mailer = CountingMailer::ok();
        let engine = engine(sheet, mailer);

        let summary = engine.run_cycle(now(), true).await.unwrap();
        let rows: Vec<usize> = summary.successes.iter().map(|o| o.row).collect();
        assert_eq!(rows, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let mut sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", ""),
        );
        Arc::get_mut(&mut sheet).unwrap().fail_fetch = true;
        let engine = engine(sheet, CountingMailer::ok());
        assert!(engine.run_cycle(now(), true).await.is_err());
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal_and_store_unchanged() {
        let mut sheet = MemorySheet::new(
            identity_grid(),
            state_grid("welcome", "2024-01-01T00:00:00Z", ""),
        );
        Arc::get_mut(&mut sheet).unwrap().fail_write = true;
        let engine = engine(sheet.clone(), CountingMailer::ok());

        assert!(engine.run_cycle(now(), true).await.is_err());
        // Nothing committed — the next cycle re-derives the same due set.
        let row = sheet.state_row(2);
        assert_eq!(row[0], "welcome");
        assert_eq!(row[2], "");
    }

    #[tokio::test]
    async fn test_hardware_followup_terminates() {
        let sheet = MemorySheet::new(
            identity_grid(),
            state_grid("hardware_followup", "2024-01-01T00:00:00Z", ""),
        );
        let mailer = CountingMailer::ok();
        let engine = engine(sheet.clone(), mailer);

        engine.run_cycle(now(), true).await.unwrap();
        let row = sheet.state_row(2);
        assert_eq!(row[0], "complete");
        assert_eq!(row[1], "");
        assert!(row[3].ends_with("; complete"));
    }
}
