//! # Herald Gateway
//!
//! Thin HTTP adapter around the poll engine. A timer (Cloud Scheduler or
//! the built-in poller) hits `/scheduler/run`; the gateway runs one cycle
//! and echoes its structured summary.

pub mod routes;
pub mod server;

pub use server::{AppState, ScheduleState, build_router, start};
