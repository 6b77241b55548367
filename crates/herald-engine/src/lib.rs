//! # Herald Engine
//!
//! The polling state machine that drives onboarding emails. Every cycle it
//! reads the tracker, decides which rows are due, sends the matching
//! templated email, and stages the row's next state for one batched write.
//!
//! ## Architecture
//! ```text
//! PollEngine::run_cycle (FETCH -> PROCESS -> COMMIT)
//!   ├── record::parse_records     identity + state grids -> Records
//!   ├── Record::is_due            elapsed AND not already processed
//!   ├── Dispatcher::dispatch      type -> template + transport call
//!   ├── TransitionPolicy::next    success advances, failure retries in place
//!   ├── StatusToken::encode       idempotency token + human summary
//!   └── writer::commit            one batched write per cycle
//! ```
//!
//! Idempotency: the status cell stores
//! `type|planned_at|outcome|sent_at|attempts[|detail]`; a row whose token
//! already records `sent` for its exact (type, planned_at) pair is never
//! selected again, which is the only guard against duplicate sends across
//! repeated or overlapping polls.

pub mod cycle;
pub mod dispatch;
pub mod record;
pub mod schema;
pub mod status;
pub mod transition;
pub mod writer;

pub use cycle::{CycleSummary, PollEngine, RowOutcome};
pub use dispatch::{DispatchResult, Dispatcher};
pub use record::{EmailType, Identity, Record};
pub use schema::StateRange;
pub use status::{SendOutcome, StatusToken};
pub use transition::TransitionPolicy;
